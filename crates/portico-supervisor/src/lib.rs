// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker lifecycle supervision for the Portico gateway.
//!
//! The supervisor owns the worker table: spawning child processes, probing
//! readiness and liveness, reaping idle workers, and tearing everything
//! down on shutdown. Each authenticated user gets at most one running
//! worker; one default worker serves unauthenticated traffic.

pub mod ports;
pub mod supervisor;
pub mod worker;

pub use supervisor::{InstanceStats, WorkerSupervisor};
pub use worker::WorkerInfo;
