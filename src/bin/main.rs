//! mlgateway binary.
//!
//! Entry point for the model gateway: a gRPC service for training, serving
//! and staging versioned machine-learning models.

use anyhow::Context;
use clap::Parser;
use mlgateway_core::{
    cli::commands::Commands,
    cli::handlers::{init_logging, run_server},
    config::ServiceConfig,
};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(cmd) => {
            let config = ServiceConfig::load(&cmd.overrides()).context("Failed to load configuration")?;
            let level = config.logging.level.clone().unwrap_or_else(|| "info".to_string());
            let _log_guard = init_logging(
                &level,
                cmd.logging.log_filter.as_deref(),
                config.logging.dir.as_deref(),
            )?;

            info!("mlgateway {} starting up", env!("CARGO_PKG_VERSION"));
            run_server(config).await?;
        }
    }

    Ok(())
}
