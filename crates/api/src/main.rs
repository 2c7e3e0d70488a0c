//! Communauté - forum sync services
//!
//! Main entry point for the `communaute` binary.

use anyhow::{anyhow, Context};
use clap::Parser;
use communaute_api::cli::{self, Cli};
use communaute_api::utils::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the configuration reads COMMUNAUTE_* variables
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.clone()).context("failed to load configuration")?;
    init_tracing(&config.logging).map_err(|err| anyhow!("failed to initialise tracing: {err}"))?;

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => tracing::debug!("no .env file found"),
        Err(err) => tracing::warn!(error = %err, "could not load .env file"),
    }

    cli::execute(cli.command, config).await.context("command failed")?;
    Ok(())
}
