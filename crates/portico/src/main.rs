// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portico - a multi-tenant gateway for single-user tool-server workers.
//!
//! This is the binary entry point for the gateway.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod doctor;
mod serve;
mod shutdown;
mod status;

/// Portico - a multi-tenant gateway for single-user tool-server workers.
#[derive(Parser, Debug)]
#[command(name = "portico", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway.
    Serve,
    /// Print the effective configuration with secrets redacted.
    Config,
    /// Run diagnostic checks against the environment.
    Doctor {
        /// Run additional intensive checks.
        #[arg(long)]
        deep: bool,
    },
    /// Show the state of a running gateway.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match portico_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            let errors = portico_config::figment_to_config_errors(e);
            portico_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    // Doctor and status run on an unvalidated config: doctor reports the
    // problems itself, and status only needs the listener address.
    if matches!(cli.command, Commands::Serve | Commands::Config) {
        if let Err(errors) = portico_config::validate_config(&config) {
            portico_config::render_errors(&errors);
            std::process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Config => {
            print_config(config);
            Ok(())
        }
        Commands::Doctor { deep } => doctor::run_doctor(&config, deep).await,
        Commands::Status { json } => status::run_status(&config, json).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Prints the effective configuration as TOML with secrets blanked.
fn print_config(mut config: portico_config::PorticoConfig) {
    if !config.idp.app_secret.is_empty() {
        config.idp.app_secret = "[redacted]".to_string();
    }
    if config.storage.master_key.is_some() {
        config.storage.master_key = Some("[redacted]".to_string());
    }
    match toml::to_string_pretty(&config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("error: failed to render configuration: {e}");
            std::process::exit(1);
        }
    }
}
