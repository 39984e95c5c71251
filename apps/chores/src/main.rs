//! # Chores - Household Chore Engine
//!
//! The main binary for the chores engine.
//!
//! This application provides:
//! - Poll loop with precise wake-ups for debounce, cooldown and schedules
//! - HTTP REST API server (axum-based) for entity updates and force commands
//! - CLI interface for validation, status and offline force commands
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    apps/chores (THE BINARY)                  │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │   Poll Loop     │   │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio + state) │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬────────┘   │
//! │         │                  │                    │            │
//! │         └──────────────────┼────────────────────┘            │
//! │                            ▼                                 │
//! │                    ┌───────────────┐                         │
//! │                    │  chores-core  │                         │
//! │                    │ (THE LOGIC)   │                         │
//! │                    └───────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Run the engine
//! chores --config chores.toml --state chores-state.json run
//!
//! # CLI operations
//! chores check
//! chores status
//! chores force laundry complete
//! ```

use chores::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CHORES_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CHORES_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chores=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
   ___ _
  / __| |_  ___ _ _ ___ ___
 | (__| ' \/ _ \ '_/ -_|_-<
  \___|_||_\___/_| \___/__/

  Household Chore Engine v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
