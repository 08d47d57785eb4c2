// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth 2.0 federation for the Portico gateway.
//!
//! The broker starts authorization flows, consumes one-shot callback state,
//! exchanges codes at the identity provider, and keeps per-user credentials
//! fresh via pre-emptive refresh.

pub mod broker;
pub mod idp;

pub use broker::OAuthBroker;
pub use idp::{IdpClient, TokenData, UserInfoData};
