// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading, validation, and diagnostics for the Portico gateway.
//!
//! Configuration merges compiled defaults, the XDG TOML hierarchy, and
//! `PORTICO_*` environment variables, then runs semantic validation that
//! collects every problem before the gateway refuses to start.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{figment_to_config_errors, render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PorticoConfig;
pub use validation::validate_config;

/// Load configuration from a TOML string and run semantic validation.
///
/// Deserialization and validation problems are both reported as
/// [`ConfigError`] diagnostics.
pub fn load_and_validate_str(toml_content: &str) -> Result<PorticoConfig, Vec<ConfigError>> {
    let config = load_config_from_str(toml_content).map_err(figment_to_config_errors)?;
    validate_config(&config)?;
    Ok(config)
}
