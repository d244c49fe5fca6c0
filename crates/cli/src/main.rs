//! Scenario runner for action definitions.
//!
//! Loads a JSON scenario (actor, entities, scope table, actions) and runs it
//! through the standard pipeline.
//! Run with: `actions <command> <scenario.json>`

mod commands;
mod scenario;

use anyhow::Result;
use clap::Parser;
use commands::{Check, Resolve};

/// Log filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

/// Resolve and format action definitions against a scenario file
#[derive(Parser)]
#[command(name = "actions")]
#[command(about = "Action target resolution tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Run actions through the pipeline and print the formatted instances
    Resolve(Resolve),

    /// Validate definitions without evaluating any scope
    Check(Check),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for ACTION_* and RUST_LOG)
    let _ = dotenvy::dotenv();

    // Diagnostics go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Resolve(cmd) => cmd.execute().await,
        Command::Check(cmd) => cmd.execute(),
    }
}
