// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The HTTP face of the Portico gateway.
//!
//! Binds the session registry, OAuth broker, and worker supervisor to the
//! client-facing endpoint table: the event stream, the JSON-RPC reply
//! endpoint, the OAuth start/callback pair, the tool listing, and the
//! health snapshot.

pub mod handlers;
pub mod rate_limit;
pub mod router;
pub mod server;
pub mod sse;

pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use router::RequestRouter;
pub use server::{build_router, start_server, GatewayState, HealthState, MemorySnapshot};
