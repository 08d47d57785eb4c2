// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Portico workspace.
//!
//! Provides the mock worker (in-process and as a spawnable binary), IdP
//! stubbing helpers, and a full-stack harness that serves the gateway on an
//! ephemeral port.

pub mod harness;
pub mod mock_idp;
pub mod mock_worker;

pub use harness::{pick_free_port, TestHarness, TestHarnessBuilder};
pub use mock_worker::{mock_worker_app, spawn_mock_worker, MockWorkerIdentity};
