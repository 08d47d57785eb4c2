// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `portico serve` command implementation.
//!
//! Wires the credential store, OAuth broker, session registry, worker
//! supervisor, and request router together and serves the HTTP surface
//! until a shutdown signal arrives. All components are ordinary values
//! constructed here and shared by `Arc` -- there is no process-wide state
//! beyond the allocator.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use portico_config::PorticoConfig;
use portico_core::PorticoError;
use portico_credentials::{resolve_master_key, CredentialStore};
use portico_gateway::{
    start_server, GatewayState, HealthState, MemorySnapshot, RateLimiter, RequestRouter,
};
use portico_oauth::{IdpClient, OAuthBroker};
use portico_session::SessionRegistry;
use portico_supervisor::WorkerSupervisor;

use crate::shutdown;

/// Runs the `portico serve` command.
pub async fn run_serve(config: PorticoConfig) -> Result<(), PorticoError> {
    init_tracing(&config.daemon.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting portico serve");

    let data_dir = PathBuf::from(&config.storage.data_dir);
    std::fs::create_dir_all(&data_dir).map_err(|e| {
        PorticoError::Config(format!(
            "cannot create data dir {}: {e}",
            data_dir.display()
        ))
    })?;

    // Credential store with the refresh-token sealing key.
    let master_key = resolve_master_key(config.storage.master_key.as_deref(), &data_dir)?;
    let store = Arc::new(CredentialStore::new(
        data_dir.clone(),
        master_key,
        Duration::from_millis(config.storage.token_cache_ttl_ms),
    ));

    // OAuth broker against the configured IdP.
    let idp = IdpClient::new(config.idp.clone())?;
    let broker = Arc::new(OAuthBroker::new(idp, Arc::clone(&store)));

    // Session registry.
    let registry = Arc::new(SessionRegistry::new(
        config.session.max_sessions,
        Duration::from_millis(config.session.idle_ttl_ms),
    ));

    // Worker supervisor; bringing up the default worker is part of startup.
    let supervisor = Arc::new(WorkerSupervisor::new(
        config.worker.clone(),
        data_dir,
        config.idp.app_id.clone(),
        config.idp.app_secret.clone(),
    ));
    supervisor.initialize().await?;

    let router = Arc::new(RequestRouter::new(
        Arc::clone(&supervisor),
        Arc::clone(&registry),
        Duration::from_millis(config.worker.forward_timeout_ms),
    ));

    // Install the signal handler and start the background machinery.
    let cancel = shutdown::install_signal_handler();
    broker.spawn_state_sweeper(cancel.clone());
    supervisor.spawn_background_tasks(cancel.clone());

    {
        let daemon = config.daemon.clone();
        let monitor_cancel = cancel.clone();
        tokio::spawn(async move {
            memory_monitor(&daemon, monitor_cancel).await;
        });
        info!(
            warn_mb = config.daemon.memory_warn_mb,
            limit_mb = config.daemon.memory_limit_mb,
            "memory monitor started"
        );
    }

    let state = GatewayState {
        router,
        registry,
        broker,
        supervisor: Arc::clone(&supervisor),
        limiter: Arc::new(RateLimiter::new(&config.limits)),
        base_url: config.server.base_url(),
        health: HealthState {
            start_time: std::time::Instant::now(),
            memory_snapshot: Some(Arc::new(memory_snapshot)),
        },
    };

    let bind_addr = resolve_bind_addr(&config.server.host, config.server.port)?;

    tokio::select! {
        result = start_server(bind_addr, state) => result?,
        _ = cancel.cancelled() => {
            info!("shutdown requested, draining");
        }
    }

    supervisor.shutdown().await;
    info!("portico serve shutdown complete");
    Ok(())
}

/// Resolves the configured host/port into a bindable socket address.
fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr, PorticoError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| PorticoError::Config(format!("cannot resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| PorticoError::Config(format!("{host}:{port} resolves to no address")))
}

/// Current process memory usage for the health endpoint.
#[cfg(not(target_env = "msvc"))]
fn memory_snapshot() -> MemorySnapshot {
    // Fresh jemalloc stats require an epoch advance.
    let _ = tikv_jemalloc_ctl::epoch::advance();
    MemorySnapshot {
        heap_bytes: tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0) as u64,
        resident_bytes: tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0) as u64,
        rss_bytes: read_rss_bytes().unwrap_or(0),
    }
}

#[cfg(target_env = "msvc")]
fn memory_snapshot() -> MemorySnapshot {
    MemorySnapshot::default()
}

/// Background task that watches heap usage and logs memory pressure.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(
    config: &portico_config::model::DaemonConfig,
    cancel: tokio_util::sync::CancellationToken,
) {
    let warn_bytes = config.memory_warn_mb * 1024 * 1024;
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.monitor_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = memory_snapshot();
                if snapshot.heap_bytes > warn_bytes {
                    warn!(
                        allocated_mb = snapshot.heap_bytes / (1024 * 1024),
                        threshold_mb = config.memory_warn_mb,
                        "memory pressure: heap above warning threshold"
                    );
                }
            }
            _ = cancel.cancelled() => {
                info!("memory monitor shutting down");
                break;
            }
        }
    }
}

/// Stub memory monitor for MSVC (no jemalloc).
#[cfg(target_env = "msvc")]
async fn memory_monitor(
    _config: &portico_config::model::DaemonConfig,
    cancel: tokio_util::sync::CancellationToken,
) {
    cancel.cancelled().await;
}

/// Read the process RSS in bytes from /proc/self/statm (Linux only).
#[cfg(not(target_env = "msvc"))]
fn read_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let rss_pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
        Some(rss_pages * 4096)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("portico={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_bind_addr_accepts_ip() {
        let addr = resolve_bind_addr("127.0.0.1", 8402).unwrap();
        assert_eq!(addr.port(), 8402);
    }

    #[test]
    fn resolve_bind_addr_rejects_garbage() {
        assert!(resolve_bind_addr("definitely not a host name", 1).is_err());
    }

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn memory_snapshot_reports_heap() {
        let snapshot = memory_snapshot();
        assert!(snapshot.heap_bytes > 0);
    }
}
