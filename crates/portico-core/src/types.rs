// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Portico workspace.

use serde::{Deserialize, Serialize};

/// User id sentinel for the always-on default worker.
pub const DEFAULT_WORKER: &str = "default";

/// States in the worker lifecycle FSM.
///
/// Transitions: `Starting -> Running` on a successful readiness probe,
/// `Running -> Stopping -> Stopped` on graceful stop, and any live state
/// `-> Error` on probe failure or unexpected child exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Child spawned, readiness not yet confirmed.
    Starting,
    /// Ready to accept forwarded requests.
    Running,
    /// Graceful termination requested.
    Stopping,
    /// Child has exited after a stop.
    Stopped,
    /// Probe failure or unexpected exit.
    Error,
}

impl WorkerStatus {
    /// Whether the worker still owns a live child process.
    pub fn is_live(self) -> bool {
        matches!(self, WorkerStatus::Starting | WorkerStatus::Running | WorkerStatus::Stopping)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Starting => write!(f, "starting"),
            WorkerStatus::Running => write!(f, "running"),
            WorkerStatus::Stopping => write!(f, "stopping"),
            WorkerStatus::Stopped => write!(f, "stopped"),
            WorkerStatus::Error => write!(f, "error"),
        }
    }
}

/// Generates a fresh opaque session identifier (128 bits, printable).
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
