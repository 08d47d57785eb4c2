// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master key resolution for refresh-token sealing.
//!
//! The key comes from configuration (64 hex chars) when provided; otherwise
//! a key is generated on first start and persisted to `{data_dir}/master.key`
//! with owner-only permissions. The key lives in memory wrapped in
//! [`Zeroizing`] so it is wiped on drop.

use std::path::Path;

use portico_core::PorticoError;
use tracing::info;
use zeroize::Zeroizing;

use crate::crypto;

/// File name of the generated master key inside the data directory.
const KEY_FILE: &str = "master.key";

/// Resolve the 32-byte sealing key.
///
/// Precedence: configured hex key, existing key file, freshly generated key
/// (which is persisted for subsequent starts).
pub fn resolve_master_key(
    configured_hex: Option<&str>,
    data_dir: &Path,
) -> Result<Zeroizing<[u8; 32]>, PorticoError> {
    if let Some(hex_key) = configured_hex {
        return decode_key(hex_key.trim());
    }

    let path = data_dir.join(KEY_FILE);
    if path.exists() {
        let content = std::fs::read_to_string(&path).map_err(|e| PorticoError::Credentials {
            message: format!("failed to read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        return decode_key(content.trim());
    }

    let key = crypto::generate_random_key()?;
    std::fs::create_dir_all(data_dir).map_err(|e| PorticoError::Credentials {
        message: format!("failed to create data dir {}", data_dir.display()),
        source: Some(Box::new(e)),
    })?;
    std::fs::write(&path, hex::encode(key)).map_err(|e| PorticoError::Credentials {
        message: format!("failed to write {}", path.display()),
        source: Some(Box::new(e)),
    })?;
    restrict_permissions(&path)?;

    info!(path = %path.display(), "generated new token sealing key");
    Ok(Zeroizing::new(key))
}

fn decode_key(hex_key: &str) -> Result<Zeroizing<[u8; 32]>, PorticoError> {
    let bytes = hex::decode(hex_key)
        .map_err(|_| PorticoError::Crypto("master key is not valid hex".to_string()))?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| PorticoError::Crypto("master key must be 32 bytes".to_string()))?;
    Ok(Zeroizing::new(key))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), PorticoError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
        PorticoError::Credentials {
            message: format!("failed to restrict permissions on {}", path.display()),
            source: Some(Box::new(e)),
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), PorticoError> {
    Ok(())
}
