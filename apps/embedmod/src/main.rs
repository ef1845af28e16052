//! # embedmod - Embedded Module Tooling
//!
//! The command-line binary for the embedmod loader.
//!
//! This application provides:
//! - Module image tooling (pack, inspect)
//! - Staging cache operations
//! - Loader and resolution dry runs against a bundle directory
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/embedmod (THE BINARY)               │
//! │                                                          │
//! │   ┌─────────────┐   ┌──────────────┐   ┌─────────────┐   │
//! │   │  CLI (clap) │   │ Settings     │   │ Logging     │   │
//! │   │             │   │ (toml + env) │   │ (tracing)   │   │
//! │   └──────┬──────┘   └──────┬───────┘   └─────────────┘   │
//! │          └─────────┬───────┘                             │
//! │                    ▼                                     │
//! │           ┌─────────────────┐                            │
//! │           │  embedmod-core  │                            │
//! │           │  (THE LOADER)   │                            │
//! │           └─────────────────┘                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Build an image and stage it
//! embedmod pack --name Helper --module-version 1.2.0 -p helper.bin -o Helper.dll
//! embedmod stage -i Helper.dll
//!
//! # Dry-run against a bundle directory
//! embedmod list -b resources -n App
//! embedmod load -b resources -n App -r App.Helper.dll
//! embedmod resolve -b resources -n App "Helper, Version=1.2.0"
//! ```

use clap::Parser;
use embedmod::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // EMBEDMOD_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("EMBEDMOD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "embedmod=debug,embedmod_core=debug"
    } else if cli.quiet {
        "error"
    } else {
        "embedmod=info,embedmod_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
