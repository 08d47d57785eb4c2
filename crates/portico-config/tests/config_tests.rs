// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Portico configuration system.

use portico_config::diagnostic::{suggest_key, ConfigError};
use portico_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_portico_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8500
public_url = "https://gateway.example.com"

[idp]
app_id = "cli_test123"
app_secret = "shhh"
redirect_uri = "https://gateway.example.com/oauth/callback"
scope = "contact:user.base:readonly"

[worker]
binary_path = "/opt/worker/bin/mcp-worker"
base_port = 9300
default_port = 9299
max_instances = 8
idle_timeout_ms = 120000

[session]
max_sessions = 500
idle_ttl_ms = 3600000

[storage]
data_dir = "/var/lib/portico"
token_cache_ttl_ms = 60000

[limits]
session_max_requests = 60
ip_max_requests = 200
window_ms = 30000

[daemon]
log_level = "debug"
memory_warn_mb = 256
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8500);
    assert_eq!(config.server.base_url(), "https://gateway.example.com");
    assert_eq!(config.idp.app_id, "cli_test123");
    assert_eq!(config.worker.binary_path, "/opt/worker/bin/mcp-worker");
    assert_eq!(config.worker.max_instances, 8);
    assert_eq!(config.session.max_sessions, 500);
    assert_eq!(config.storage.data_dir, "/var/lib/portico");
    assert_eq!(config.limits.session_max_requests, 60);
    assert_eq!(config.daemon.log_level, "debug");
}

/// A typo in a section key produces an unknown-field error.
#[test]
fn unknown_field_in_worker_produces_error() {
    let toml = r#"
[worker]
binary_pth = "/opt/worker"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("binary_pth"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Empty TOML deserializes to defaults but fails validation on the
/// mandatory IdP fields.
#[test]
fn empty_config_fails_validation_on_idp() {
    let errors = load_and_validate_str("").expect_err("IdP fields are mandatory");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "idp.app_id")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "idp.app_secret")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "idp.redirect_uri")));
}

/// A minimal config with just the IdP section validates cleanly.
#[test]
fn minimal_idp_config_validates() {
    let toml = r#"
[idp]
app_id = "cli_abc"
app_secret = "s3cret"
redirect_uri = "http://127.0.0.1:8402/oauth/callback"
"#;
    let config = load_and_validate_str(toml).expect("minimal config should validate");
    assert_eq!(config.worker.default_port, 9299);
    assert_eq!(config.server.base_url(), "http://127.0.0.1:8402");
}

/// Validation catches multiple problems in one pass.
#[test]
fn validation_collects_all_errors() {
    let toml = r#"
[idp]
app_id = "cli_abc"
app_secret = "s3cret"
redirect_uri = "gopher://bad"

[server]
port = 9300

[worker]
base_port = 9300
"#;
    let errors = load_and_validate_str(toml).expect_err("should collect errors");
    // redirect_uri scheme + base_port collision.
    assert!(errors.len() >= 2, "expected >= 2 errors, got {errors:?}");
}

/// Fuzzy suggestions point at the intended key.
#[test]
fn suggestions_cover_common_typos() {
    assert_eq!(
        suggest_key("idle_timout_ms", &["idle_timeout_ms", "base_port"]),
        Some("idle_timeout_ms".to_string())
    );
    assert_eq!(
        suggest_key("redirect_url", &["redirect_uri", "app_id"]),
        Some("redirect_uri".to_string())
    );
}
