// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: mandatory IdP credentials, port disjointness between the
//! gateway and its workers, and sane resource bounds.

use crate::diagnostic::ConfigError;
use crate::model::PorticoConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PorticoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // The three IdP fields are the only mandatory settings.
    if config.idp.app_id.trim().is_empty() {
        errors.push(ConfigError::MissingKey {
            key: "idp.app_id".to_string(),
        });
    }
    if config.idp.app_secret.trim().is_empty() {
        errors.push(ConfigError::MissingKey {
            key: "idp.app_secret".to_string(),
        });
    }
    if config.idp.redirect_uri.trim().is_empty() {
        errors.push(ConfigError::MissingKey {
            key: "idp.redirect_uri".to_string(),
        });
    } else if !config.idp.redirect_uri.starts_with("http") {
        errors.push(ConfigError::Validation {
            message: format!(
                "idp.redirect_uri must begin with `http`, got `{}`",
                config.idp.redirect_uri
            ),
        });
    }

    // Validate host looks like a valid IP or hostname.
    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    // Workers must not collide with the gateway's own port.
    if config.worker.base_port == config.server.port {
        errors.push(ConfigError::Validation {
            message: format!(
                "worker.base_port ({}) must differ from server.port",
                config.worker.base_port
            ),
        });
    }
    if config.worker.default_port == config.server.port {
        errors.push(ConfigError::Validation {
            message: format!(
                "worker.default_port ({}) must differ from server.port",
                config.worker.default_port
            ),
        });
    }

    if config.worker.port_window == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.port_window must be at least 1".to_string(),
        });
    }

    if config.worker.max_instances == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.max_instances must be at least 1".to_string(),
        });
    }

    if config.session.max_sessions == 0 {
        errors.push(ConfigError::Validation {
            message: "session.max_sessions must be at least 1".to_string(),
        });
    }

    if config.storage.data_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.data_dir must not be empty".to_string(),
        });
    }

    if let Some(ref key) = config.storage.master_key {
        let is_hex_256 = key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex_256 {
            errors.push(ConfigError::Validation {
                message: "storage.master_key must be 64 hexadecimal characters (256 bits)"
                    .to_string(),
            });
        }
    }

    if config.limits.window_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "limits.window_ms must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> PorticoConfig {
        let mut config = PorticoConfig::default();
        config.idp.app_id = "cli_test".to_string();
        config.idp.app_secret = "secret".to_string();
        config.idp.redirect_uri = "http://localhost:8402/oauth/callback".to_string();
        config
    }

    #[test]
    fn default_config_fails_on_missing_idp_fields() {
        let errors = validate_config(&PorticoConfig::default()).unwrap_err();
        let missing: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::MissingKey { key } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert!(missing.contains(&"idp.app_id"));
        assert!(missing.contains(&"idp.app_secret"));
        assert!(missing.contains(&"idp.redirect_uri"));
    }

    #[test]
    fn configured_idp_passes() {
        assert!(validate_config(&configured()).is_ok());
    }

    #[test]
    fn non_http_redirect_uri_fails() {
        let mut config = configured();
        config.idp.redirect_uri = "ftp://example.com/callback".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("redirect_uri"))
        ));
    }

    #[test]
    fn worker_port_colliding_with_gateway_fails() {
        let mut config = configured();
        config.worker.base_port = config.server.port;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("base_port"))
        ));

        let mut config = configured();
        config.worker.default_port = config.server.port;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("default_port"))
        ));
    }

    #[test]
    fn zero_bounds_fail() {
        let mut config = configured();
        config.worker.max_instances = 0;
        config.session.max_sessions = 0;
        config.worker.port_window = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ConfigError::Validation { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn malformed_master_key_fails() {
        let mut config = configured();
        config.storage.master_key = Some("not-hex".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("master_key"))
        ));
    }

    #[test]
    fn well_formed_master_key_passes() {
        let mut config = configured();
        config.storage.master_key = Some("ab".repeat(32));
        assert!(validate_config(&config).is_ok());
    }
}
