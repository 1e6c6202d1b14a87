//! # slm-batch CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - configuration loading with environment overrides
//! - the `generate`, `send` and `check-prefix` commands
//! - live progress output from library events

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_check_prefix, run_generate, run_send};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "slm-batch starting");

    let result = match &cli.command {
        Commands::Generate(args) => run_generate(cli.config.as_deref(), args).await,
        Commands::Send(args) => run_send(cli.config.as_deref(), args).await,
        Commands::CheckPrefix(args) => run_check_prefix(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging; `RUST_LOG` wins over `--log-level`
fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
