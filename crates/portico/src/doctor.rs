// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `portico doctor` command implementation.
//!
//! Runs diagnostic checks against the gateway environment: configuration,
//! data directory, sealing key, worker binary, IdP reachability, and the
//! local health endpoint. With `--deep`, adds port availability, a
//! credential inventory, and a memory baseline.

use std::path::Path;
use std::time::{Duration, Instant};

use portico_config::PorticoConfig;
use portico_core::PorticoError;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Check status.
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    /// Duration the check took.
    pub duration: Duration,
}

fn check(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status,
        message: message.into(),
        duration: start.elapsed(),
    }
}

/// Run the `portico doctor` command.
pub async fn run_doctor(config: &PorticoConfig, deep: bool) -> Result<(), PorticoError> {
    let mut results = Vec::new();

    results.push(check_config(config));
    results.push(check_data_dir(config));
    results.push(check_sealing_key(config));
    results.push(check_worker_binary(config));
    results.push(check_idp_reachability(config).await);
    results.push(check_health_endpoint(config).await);

    if deep {
        results.push(check_worker_ports(config));
        results.push(check_credential_inventory(config));
        results.push(check_memory_baseline());
    }

    println!();
    println!("  portico doctor");
    println!("  {}", "-".repeat(56));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in &results {
        let duration_ms = result.duration.as_millis();
        let marker = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => {
                warn_count += 1;
                "[WARN]"
            }
            CheckStatus::Fail => {
                fail_count += 1;
                "[FAIL]"
            }
        };
        println!(
            "    {marker} {:<22} {} ({duration_ms}ms)",
            result.name, result.message
        );
    }

    println!();
    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    if fail_count > 0 {
        return Err(PorticoError::Config(format!(
            "{fail_count} diagnostic check(s) failed"
        )));
    }
    Ok(())
}

/// Semantic validation of the already-loaded configuration.
fn check_config(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    match portico_config::validate_config(config) {
        Ok(()) => check("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => check(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Data directory exists and is writable.
fn check_data_dir(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    let dir = Path::new(&config.storage.data_dir);

    if !dir.exists() {
        return check(
            "Data directory",
            CheckStatus::Warn,
            format!("not found: {} (created on first run)", dir.display()),
            start,
        );
    }

    let probe = dir.join(".doctor-probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            check("Data directory", CheckStatus::Pass, "writable", start)
        }
        Err(e) => check(
            "Data directory",
            CheckStatus::Fail,
            format!("not writable: {e}"),
            start,
        ),
    }
}

/// Sealing key is decodable (configured or on disk).
fn check_sealing_key(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    let data_dir = Path::new(&config.storage.data_dir);

    if config.storage.master_key.is_none() && !data_dir.join("master.key").exists() {
        return check(
            "Sealing key",
            CheckStatus::Warn,
            "none yet (generated on first run)",
            start,
        );
    }

    match portico_credentials::resolve_master_key(
        config.storage.master_key.as_deref(),
        data_dir,
    ) {
        Ok(_) => check("Sealing key", CheckStatus::Pass, "usable", start),
        Err(e) => check("Sealing key", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Worker binary resolves to an existing file or a PATH entry.
fn check_worker_binary(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    let binary = &config.worker.binary_path;
    let path = Path::new(binary);

    let found = if path.components().count() > 1 {
        path.is_file()
    } else {
        std::env::var_os("PATH")
            .map(|paths| {
                std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file())
            })
            .unwrap_or(false)
    };

    if found {
        check("Worker binary", CheckStatus::Pass, binary.clone(), start)
    } else {
        check(
            "Worker binary",
            CheckStatus::Fail,
            format!("not found: {binary}"),
            start,
        )
    }
}

/// IdP authorization endpoint answers HTTP at all.
async fn check_idp_reachability(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return check(
                "IdP endpoint",
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
                start,
            )
        }
    };

    match client.head(&config.idp.authorize_url).send().await {
        Ok(_) => check("IdP endpoint", CheckStatus::Pass, "reachable", start),
        Err(e) => {
            let message = if e.is_timeout() {
                "timeout (5s)".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                format!("error: {e}")
            };
            check("IdP endpoint", CheckStatus::Fail, message, start)
        }
    }
}

/// Local gateway health endpoint (warns when the gateway is not running).
async fn check_health_endpoint(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    let url = format!(
        "http://{}:{}/health",
        config.server.host, config.server.port
    );

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return check(
                "Health endpoint",
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
                start,
            )
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            check("Health endpoint", CheckStatus::Pass, "reachable", start)
        }
        Ok(resp) => check(
            "Health endpoint",
            CheckStatus::Warn,
            format!("status {}", resp.status()),
            start,
        ),
        Err(_) => check(
            "Health endpoint",
            CheckStatus::Warn,
            format!("not reachable at {url} (gateway may not be running)"),
            start,
        ),
    }
}

/// Deep check: default and base worker ports are bindable.
///
/// A busy port is only a warning: it usually means the gateway (and its
/// workers) are already up.
fn check_worker_ports(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    let mut busy = Vec::new();

    for port in [config.worker.default_port, config.worker.base_port] {
        if std::net::TcpListener::bind(("127.0.0.1", port)).is_err() {
            busy.push(port);
        }
    }

    if busy.is_empty() {
        check("Worker ports", CheckStatus::Pass, "available", start)
    } else {
        check(
            "Worker ports",
            CheckStatus::Warn,
            format!("in use: {busy:?} (workers may be running)"),
            start,
        )
    }
}

/// Deep check: per-user credential files parse (no secrets are printed).
fn check_credential_inventory(config: &PorticoConfig) -> CheckResult {
    let start = Instant::now();
    let data_dir = Path::new(&config.storage.data_dir);

    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(_) => {
            return check(
                "Credentials",
                CheckStatus::Warn,
                "data directory not readable (skipped)",
                start,
            )
        }
    };

    let mut users = 0usize;
    let mut corrupt = 0usize;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("user-") {
            continue;
        }
        let tokens = entry.path().join("tokens.json");
        if !tokens.is_file() {
            continue;
        }
        users += 1;
        let parses = std::fs::read(&tokens)
            .ok()
            .and_then(|raw| serde_json::from_slice::<serde_json::Value>(&raw).ok())
            .is_some();
        if !parses {
            corrupt += 1;
        }
    }

    if corrupt > 0 {
        check(
            "Credentials",
            CheckStatus::Warn,
            format!("{users} user(s), {corrupt} corrupt file(s)"),
            start,
        )
    } else {
        check(
            "Credentials",
            CheckStatus::Pass,
            format!("{users} user(s)"),
            start,
        )
    }
}

/// Deep check: memory baseline via jemalloc.
fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        check(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        check(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(data_dir: &str) -> PorticoConfig {
        let mut config = PorticoConfig::default();
        config.idp.app_id = "cli_test".to_string();
        config.idp.app_secret = "secret".to_string();
        config.idp.redirect_uri = "http://127.0.0.1:8402/oauth/callback".to_string();
        config.storage.data_dir = data_dir.to_string();
        config
    }

    #[test]
    fn check_config_passes_when_valid() {
        let result = check_config(&configured("/tmp"));
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[test]
    fn check_config_fails_on_missing_idp() {
        let result = check_config(&PorticoConfig::default());
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn missing_data_dir_warns() {
        let result = check_data_dir(&configured("/nonexistent/portico-doctor-test"));
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[test]
    fn writable_data_dir_passes() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_data_dir(&configured(dir.path().to_str().unwrap()));
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[test]
    fn missing_sealing_key_warns() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_sealing_key(&configured(dir.path().to_str().unwrap()));
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn malformed_sealing_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = configured(dir.path().to_str().unwrap());
        config.storage.master_key = Some("zz".to_string());
        let result = check_sealing_key(&config);
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn missing_worker_binary_fails() {
        let mut config = configured("/tmp");
        config.worker.binary_path = "/nonexistent/worker-binary".to_string();
        let result = check_worker_binary(&config);
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn empty_inventory_passes() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_credential_inventory(&configured(dir.path().to_str().unwrap()));
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("0 user(s)"));
    }

    #[test]
    fn corrupt_inventory_warns() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("user-u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join("tokens.json"), b"{ nope").unwrap();

        let result = check_credential_inventory(&configured(dir.path().to_str().unwrap()));
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("1 corrupt"));
    }

    #[test]
    fn memory_baseline_reports() {
        let result = check_memory_baseline();
        assert!(matches!(result.status, CheckStatus::Pass | CheckStatus::Warn));
    }
}
