// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Portico gateway.

use thiserror::Error;

/// The primary error type used across all Portico crates.
#[derive(Debug, Error)]
pub enum PorticoError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential persistence errors (directory creation, file write, rename).
    #[error("credential store error: {message}")]
    Credentials {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The OAuth `state` parameter is unknown, already consumed, or expired.
    #[error("invalid or expired authorization state")]
    InvalidState,

    /// HTTP or structural failure talking to the identity provider.
    #[error("identity provider protocol error: {message}")]
    IdpProtocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The identity provider reported a non-zero error code.
    #[error("identity provider rejected the request (code {code}): {message}")]
    IdpError { code: i64, message: String },

    /// No stored credentials exist for the user.
    #[error("no credentials for user {user_id}")]
    NoCredentials { user_id: String },

    /// Every port in the configured allocation window is held by a live worker.
    #[error("worker port range exhausted")]
    PortsExhausted,

    /// The non-default worker table is full.
    #[error("worker instance limit reached ({limit})")]
    MaxInstances { limit: usize },

    /// Spawning or readying a worker child process failed.
    #[error("worker spawn failed: {message}")]
    SpawnFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP transport failure talking to a worker.
    #[error("worker transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The worker returned something that is not a JSON-RPC response.
    #[error("invalid response from worker: {0}")]
    RpcProtocol(String),

    /// Sealing or unsealing stored refresh tokens failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
