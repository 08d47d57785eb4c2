// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker process records and spawn plumbing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};

use portico_core::{PorticoError, WorkerStatus};

/// Immutable snapshot of a worker handed out to the router and the health
/// endpoint. The supervisor's table entry is the mutable source of truth.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Supervisor-assigned instance id.
    pub instance_id: String,
    /// Bound user, `None` for the default worker.
    pub user_id: Option<String>,
    /// Loopback port the worker listens on.
    pub port: u16,
    /// Current lifecycle status.
    pub status: WorkerStatus,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Token directory handed to the child.
    pub token_dir: PathBuf,
}

impl WorkerInfo {
    /// Base URL of the worker's loopback HTTP endpoint.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

/// Mutable table entry owned by the supervisor.
#[derive(Debug)]
pub(crate) struct WorkerEntry {
    pub(crate) info: WorkerInfo,
    pub(crate) last_activity: Instant,
    pub(crate) pid: Option<u32>,
}

impl WorkerEntry {
    pub(crate) fn new(info: WorkerInfo) -> Self {
        Self {
            info,
            last_activity: Instant::now(),
            pid: None,
        }
    }
}

/// Spawn arguments for a worker child process.
///
/// The worker contract: the binary receives its subcommand and mode flags,
/// the bound port, the IdP application credentials, and the directory it
/// should read and write tokens in.
#[derive(Debug, Clone)]
pub(crate) struct SpawnSpec {
    pub(crate) binary_path: String,
    pub(crate) port: u16,
    pub(crate) idp_app_id: String,
    pub(crate) idp_app_secret: String,
    pub(crate) token_dir: PathBuf,
}

impl SpawnSpec {
    /// Launches the child. Stdout/stderr are discarded -- workers do their
    /// own file logging inside the token directory.
    pub(crate) fn spawn(&self) -> Result<Child, PorticoError> {
        Command::new(&self.binary_path)
            .arg("serve")
            .arg("--transport")
            .arg("http")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--idp-app-id")
            .arg(&self.idp_app_id)
            .arg("--idp-app-secret")
            .arg(&self.idp_app_secret)
            .arg("--token-dir")
            .arg(&self.token_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PorticoError::SpawnFailed {
                message: format!("failed to spawn worker binary `{}`", self.binary_path),
                source: Some(Box::new(e)),
            })
    }
}

/// Sends a signal to a process by pid. Errors (already-gone processes) are
/// intentionally ignored.
#[cfg(unix)]
pub(crate) fn signal_process(pid: u32, signal: i32) {
    // SAFETY: kill(2) with a plain pid and signal has no memory-safety
    // concerns; a stale pid at worst returns ESRCH.
    unsafe {
        libc::kill(pid as i32, signal);
    }
}

#[cfg(not(unix))]
pub(crate) fn signal_process(_pid: u32, _signal: i32) {}

/// Graceful-termination signal.
#[cfg(unix)]
pub(crate) const SIGNAL_TERM: i32 = libc::SIGTERM;
#[cfg(not(unix))]
pub(crate) const SIGNAL_TERM: i32 = 15;

/// Forced-kill signal.
#[cfg(unix)]
pub(crate) const SIGNAL_KILL: i32 = libc::SIGKILL;
#[cfg(not(unix))]
pub(crate) const SIGNAL_KILL: i32 = 9;

/// Creates the per-worker token directory if it does not exist.
pub(crate) fn ensure_token_dir(dir: &Path) -> Result<(), PorticoError> {
    std::fs::create_dir_all(dir).map_err(|e| PorticoError::SpawnFailed {
        message: format!("failed to create token dir {}", dir.display()),
        source: Some(Box::new(e)),
    })
}
