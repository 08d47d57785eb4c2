// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Portico gateway.
//!
//! This crate provides the error type, shared identifiers, the JSON-RPC
//! envelope, and the log-safe payload fingerprint used throughout the
//! Portico workspace.

pub mod error;
pub mod fingerprint;
pub mod rpc;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::PorticoError;
pub use fingerprint::fingerprint;
pub use types::{generate_session_id, WorkerStatus, DEFAULT_WORKER};
