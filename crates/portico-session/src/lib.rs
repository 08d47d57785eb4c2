// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session bookkeeping for the Portico gateway.

pub mod registry;

pub use registry::{SessionRegistry, SessionStats};
