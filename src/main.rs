//! hostd daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                        HOSTD                          │
//!                         │                                                       │
//!   signals ──────────────┼─▶ lifecycle ──▶ init steps ──▶ subsystem registry     │
//!                         │       │                          │        │          │
//!                         │       ▼                          ▼        ▼          │
//!   clients ──────────────┼─▶ net (TLS + local plain) ──▶ http ──▶ routing        │
//!                         │                                      │                │
//!                         │                                      ▼                │
//!                         │                         capability gate ──▶ api       │
//!                         │                                                       │
//!                         │   config · observability · auth · resources           │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use hostd::config::{load_config, DaemonConfig};
use hostd::observability::{logging, metrics};
use hostd::{Collaborators, Orchestrator};

#[derive(Parser)]
#[command(name = "hostd", version, about = "Host management daemon")]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force bootstrap mode even if the daemon was initialized before.
    #[arg(long)]
    init: bool,

    /// Run with container platform integration.
    #[arg(long)]
    in_container: bool,

    /// Log level, overrides the configuration file.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("hostd: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => DaemonConfig::default(),
    };
    config.daemon.init |= cli.init;
    config.daemon.in_container |= cli.in_container;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let collaborators = Collaborators::standard(&config);
    let orchestrator = Orchestrator::new(Arc::new(config), collaborators);

    match orchestrator.run().await {
        Ok(summary) => {
            if !summary.drain.timed_out.is_empty() {
                tracing::warn!(
                    timed_out = summary.drain.timed_out.len(),
                    "Some subsystems were aborted"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "hostd failed to start");
            ExitCode::FAILURE
        }
    }
}
