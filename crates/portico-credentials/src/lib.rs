// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential persistence for the Portico gateway.
//!
//! One directory per user under the data dir, one `tokens.json` per user,
//! refresh tokens sealed with AES-256-GCM before they reach disk. The
//! per-user directory doubles as the token directory handed to that user's
//! worker process.

pub mod crypto;
pub mod keyfile;
pub mod store;

pub use keyfile::resolve_master_key;
pub use store::{default_dir, user_dir, CredentialStore, UserCredentials, TOKENS_FILE};
