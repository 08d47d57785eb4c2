// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user credential persistence (the token store).
//!
//! Each user owns a directory `{data_dir}/user-{user_id}` containing a
//! `tokens.json` file. The refresh token is sealed with AES-256-GCM before
//! it touches disk; everything else in the record is plaintext. Writes are
//! write-then-rename so a crash leaves either the prior valid file or the
//! new one, never a partial file. An in-memory cache with TTL fronts the
//! disk; disk writes are serialized per user id.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use portico_core::PorticoError;

use crate::crypto;

/// File name of the credential record inside a user directory.
pub const TOKENS_FILE: &str = "tokens.json";

/// Decrypted credentials as used by the rest of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    /// Stable IdP-issued user identifier (the union id).
    pub user_id: String,
    /// Current access token.
    pub access_token: String,
    /// Long-lived refresh token (plaintext only in memory).
    pub refresh_token: String,
    /// Absolute expiry instant of the access token.
    pub expires_at: DateTime<Utc>,
}

impl UserCredentials {
    /// Time remaining until the access token expires (zero when past due).
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}

/// A sealed value: base64 nonce + base64 ciphertext-with-tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedBlob {
    nonce: String,
    ciphertext: String,
}

/// On-disk record layout of `tokens.json`.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    user_id: String,
    access_token: String,
    refresh_token: SealedBlob,
    expires_at: DateTime<Utc>,
}

struct CacheEntry {
    credentials: UserCredentials,
    cached_at: Instant,
}

/// Token store: cached, sealed, per-user credential files.
pub struct CredentialStore {
    data_dir: PathBuf,
    master_key: Zeroizing<[u8; 32]>,
    cache_ttl: Duration,
    cache: DashMap<String, CacheEntry>,
    // Serializes disk writes per user id.
    write_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

/// Directory holding a user's tokens, also handed to that user's worker.
pub fn user_dir(data_dir: &Path, user_id: &str) -> PathBuf {
    data_dir.join(format!("user-{user_id}"))
}

/// Token directory of the always-on default worker.
pub fn default_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("default")
}

impl CredentialStore {
    /// Creates a store rooted at `data_dir`, sealing with `master_key`.
    pub fn new(data_dir: PathBuf, master_key: Zeroizing<[u8; 32]>, cache_ttl: Duration) -> Self {
        Self {
            data_dir,
            master_key,
            cache_ttl,
            cache: DashMap::new(),
            write_locks: DashMap::new(),
        }
    }

    /// Root data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Loads credentials for a user.
    ///
    /// Returns `None` when no file exists, when the file is corrupt, or when
    /// the refresh token cannot be unsealed. Corruption is logged, never
    /// fatal.
    pub async fn load(&self, user_id: &str) -> Option<UserCredentials> {
        if !valid_user_id(user_id) {
            warn!(user_id, "rejecting malformed user id");
            return None;
        }

        if let Some(entry) = self.cache.get(user_id) {
            if entry.cached_at.elapsed() < self.cache_ttl {
                return Some(entry.credentials.clone());
            }
        }

        let path = user_dir(&self.data_dir, user_id).join(TOKENS_FILE);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(user_id, error = %e, "failed to read credential file");
                return None;
            }
        };

        let record: TokenRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(user_id, error = %e, "corrupt credential file, treating as absent");
                return None;
            }
        };

        let refresh_token = match self.unseal(&record.refresh_token) {
            Ok(token) => token,
            Err(e) => {
                warn!(user_id, error = %e, "failed to unseal refresh token, treating as absent");
                return None;
            }
        };

        let credentials = UserCredentials {
            user_id: record.user_id,
            access_token: record.access_token,
            refresh_token,
            expires_at: record.expires_at,
        };

        self.cache.insert(
            user_id.to_string(),
            CacheEntry {
                credentials: credentials.clone(),
                cached_at: Instant::now(),
            },
        );

        Some(credentials)
    }

    /// Persists credentials for a user atomically and updates the cache.
    pub async fn save(
        &self,
        user_id: &str,
        credentials: &UserCredentials,
    ) -> Result<(), PorticoError> {
        if !valid_user_id(user_id) {
            return Err(PorticoError::Credentials {
                message: format!("malformed user id `{user_id}`"),
                source: None,
            });
        }

        let lock = self
            .write_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let dir = user_dir(&self.data_dir, user_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PorticoError::Credentials {
                message: format!("failed to create {}", dir.display()),
                source: Some(Box::new(e)),
            })?;

        let record = TokenRecord {
            user_id: credentials.user_id.clone(),
            access_token: credentials.access_token.clone(),
            refresh_token: self.seal(&credentials.refresh_token)?,
            expires_at: credentials.expires_at,
        };
        let body = serde_json::to_vec_pretty(&record).map_err(|e| PorticoError::Credentials {
            message: "failed to serialize credential record".to_string(),
            source: Some(Box::new(e)),
        })?;

        // Write-then-rename keeps the prior file intact on crash.
        let path = dir.join(TOKENS_FILE);
        let tmp = dir.join(format!("{TOKENS_FILE}.tmp"));
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| PorticoError::Credentials {
                message: format!("failed to write {}", tmp.display()),
                source: Some(Box::new(e)),
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PorticoError::Credentials {
                message: format!("failed to move {} into place", tmp.display()),
                source: Some(Box::new(e)),
            })?;

        self.cache.insert(
            user_id.to_string(),
            CacheEntry {
                credentials: credentials.clone(),
                cached_at: Instant::now(),
            },
        );

        debug!(user_id, "credentials saved");
        Ok(())
    }

    /// Removes a user's credentials from cache and disk.
    ///
    /// A missing file is not an error.
    pub async fn clear(&self, user_id: &str) -> Result<(), PorticoError> {
        self.cache.remove(user_id);

        let path = user_dir(&self.data_dir, user_id).join(TOKENS_FILE);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PorticoError::Credentials {
                message: format!("failed to remove {}", path.display()),
                source: Some(Box::new(e)),
            }),
        }
    }

    /// Drops only the in-memory cache entry (disk is untouched).
    pub fn evict_cached(&self, user_id: &str) {
        self.cache.remove(user_id);
    }

    fn seal(&self, plaintext: &str) -> Result<SealedBlob, PorticoError> {
        let (ciphertext, nonce) = crypto::seal(&self.master_key, plaintext.as_bytes())?;
        let engine = base64::engine::general_purpose::STANDARD;
        Ok(SealedBlob {
            nonce: engine.encode(nonce),
            ciphertext: engine.encode(ciphertext),
        })
    }

    fn unseal(&self, blob: &SealedBlob) -> Result<String, PorticoError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let nonce_bytes = engine
            .decode(&blob.nonce)
            .map_err(|_| PorticoError::Crypto("sealed nonce is not valid base64".to_string()))?;
        let nonce: [u8; 12] = nonce_bytes
            .try_into()
            .map_err(|_| PorticoError::Crypto("sealed nonce must be 12 bytes".to_string()))?;
        let ciphertext = engine.decode(&blob.ciphertext).map_err(|_| {
            PorticoError::Crypto("sealed ciphertext is not valid base64".to_string())
        })?;
        let plaintext = crypto::open(&self.master_key, &nonce, &ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| PorticoError::Crypto("unsealed token is not UTF-8".to_string()))
    }
}

/// User ids become directory names; anything that could traverse paths is
/// rejected outright.
fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 128
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
