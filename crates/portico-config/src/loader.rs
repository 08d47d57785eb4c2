// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./portico.toml` > `~/.config/portico/portico.toml`
//! > `/etc/portico/portico.toml`, with environment variable overrides via the
//! `PORTICO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PorticoConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/portico/portico.toml` (system-wide)
/// 3. `~/.config/portico/portico.toml` (user XDG config)
/// 4. `./portico.toml` (local directory)
/// 5. `PORTICO_*` environment variables
pub fn load_config() -> Result<PorticoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used by tests and for explicit config snippets.
pub fn load_config_from_str(toml_content: &str) -> Result<PorticoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PorticoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PorticoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PorticoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PorticoConfig::default()))
        .merge(Toml::file("/etc/portico/portico.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("portico/portico.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("portico.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PORTICO_IDP_APP_SECRET` must map to
/// `idp.app_secret`, not `idp.app.secret`.
fn env_provider() -> Env {
    Env::prefixed("PORTICO_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        // Example: PORTICO_WORKER_BASE_PORT -> "worker_base_port"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("idp_", "idp.", 1)
            .replacen("worker_", "worker.", 1)
            .replacen("session_", "session.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("daemon_", "daemon.", 1);
        mapped.into()
    })
}
