// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `portico status` command implementation.
//!
//! Connects to the gateway health endpoint to display worker and session
//! counters, uptime, and memory usage. Falls back gracefully when the
//! gateway is not running.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use portico_config::PorticoConfig;
use portico_core::PorticoError;

/// The slice of the health snapshot this command renders.
#[derive(Debug, Deserialize)]
struct HealthSnapshot {
    status: String,
    uptime: u64,
    instances: InstanceCounters,
    sessions: SessionCounters,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceCounters {
    total_instances: usize,
    user_instances: usize,
    running_instances: usize,
    default_instance_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCounters {
    total_sessions: usize,
    authenticated_sessions: usize,
    recent_sessions: usize,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `portico status` command.
///
/// With `--json`, outputs structured JSON for scripting.
pub async fn run_status(config: &PorticoConfig, json: bool) -> Result<(), PorticoError> {
    let host = &config.server.host;
    let port = config.server.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| PorticoError::Internal(format!("failed to create HTTP client: {e}")))?;

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthSnapshot = resp.json().await.map_err(|e| {
                PorticoError::Internal(format!("failed to parse health response: {e}"))
            })?;
            let uptime_human = format_uptime(health.uptime);

            if json {
                let output = StatusOutput {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime),
                    uptime_human: Some(uptime_human),
                    gateway_host: host.clone(),
                    gateway_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                println!();
                println!("  portico: {} (up {uptime_human})", health.status);
                println!(
                    "  workers:  {} total, {} user, {} running, default {}",
                    health.instances.total_instances,
                    health.instances.user_instances,
                    health.instances.running_instances,
                    health.instances.default_instance_status,
                );
                println!(
                    "  sessions: {} total, {} authenticated, {} recent",
                    health.sessions.total_sessions,
                    health.sessions.authenticated_sessions,
                    health.sessions.recent_sessions,
                );
                println!();
            }
        }
        _ => {
            if json {
                let output = StatusOutput {
                    running: false,
                    status: "not running".to_string(),
                    uptime_secs: None,
                    uptime_human: None,
                    gateway_host: host.clone(),
                    gateway_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                println!();
                println!("  portico: not running (no gateway at {url})");
                println!("  Start it with `portico serve`.");
                println!();
            }
        }
    }

    Ok(())
}
