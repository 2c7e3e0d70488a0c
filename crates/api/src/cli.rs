//! Operator commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use communaute_domain::{CommunauteError, Config, Result};
use communaute_infra::config::{load, load_from_file};
use communaute_infra::DbManager;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::http;
use crate::utils::logging::log_command_execution;

#[derive(Debug, Parser)]
#[command(
    name = "communaute",
    version,
    about = "Communauté analytics backfill, Nexus directory sync and auto login"
)]
pub struct Cli {
    /// Configuration file (TOML or JSON). Without it, `COMMUNAUTE_*`
    /// variables are read, then well-known config files are probed.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the HTTP endpoints and run the stats scheduler.
    Serve,
    /// Backfill Matomo statistics up to yesterday.
    CollectMatomoStats {
        /// Collect as if today were this date (YYYY-MM-DD).
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Push every published member to Nexus and close the sync session.
    NexusFullSync,
    /// Create or update the database schema.
    Migrate,
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Serve => "serve",
            Self::CollectMatomoStats { .. } => "collect-matomo-stats",
            Self::NexusFullSync => "nexus-full-sync",
            Self::Migrate => "migrate",
        }
    }
}

/// Explicit file first, otherwise environment then probed files.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => load_from_file(Some(path)),
        None => load(),
    }
}

/// Run one command to completion and log its outcome.
pub async fn execute(command: Command, config: Config) -> Result<()> {
    let started = Instant::now();
    let name = command.name();

    let outcome = run(command, config).await;

    log_command_execution(name, started.elapsed(), outcome.as_ref().err());
    outcome
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Migrate => migrate(&config).await,
        Command::Serve => serve(Arc::new(AppContext::new(config)?)).await,
        Command::CollectMatomoStats { today } => {
            let ctx = AppContext::new(config)?;
            let today = today.unwrap_or_else(|| ctx.clock.today());
            collect_matomo_stats(&ctx, today).await
        }
        Command::NexusFullSync => {
            let ctx = AppContext::new(config)?;
            nexus_full_sync(&ctx).await.map(|_| ())
        }
    }
}

async fn migrate(config: &Config) -> Result<()> {
    let path = config.database.path.clone();
    let pool_size = config.database.pool_size;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let db = DbManager::new(&path, pool_size)?;
        db.run_migrations()?;
        info!(db_path = %db.path().display(), "schema is up to date");
        Ok(())
    })
    .await
    .map_err(|err| CommunauteError::Internal(format!("migration task failed: {err}")))?
}

async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let mut scheduler = ctx.start_stats_scheduler().await?;

    let served = http::serve(Arc::clone(&ctx), shutdown_signal())
        .await
        .map_err(|err| CommunauteError::Internal(format!("http server failed: {err}")));

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(err) = scheduler.stop().await {
            warn!(error = %err, "stats scheduler did not stop cleanly");
        }
    }
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Run both granularities. Any failed granularity fails the command after
/// the other one has been attempted.
///
/// `today` may lie in the past to replay a backfill, never in the future:
/// periods that have not ended would be stored as complete.
pub async fn collect_matomo_stats(ctx: &AppContext, today: NaiveDate) -> Result<()> {
    let clock_today = ctx.clock.today();
    if today > clock_today {
        return Err(CommunauteError::InvalidInput(format!(
            "--today {today} is after the current date {clock_today}"
        )));
    }
    let service = ctx.require_stats_collection()?;
    let summary = service.run_all(today).await?;

    for report in &summary.reports {
        info!(
            granularity = %report.granularity,
            windows = report.windows_processed,
            inserted = report.records_inserted,
            skipped = report.records_skipped,
            watermark = ?report.watermark,
            "Matomo stats collected"
        );
    }
    for (granularity, failure) in &summary.failures {
        error!(%granularity, error = %failure, "Matomo stats collection failed");
    }

    match summary.failures.into_iter().next() {
        Some((_, failure)) => Err(failure),
        None => Ok(()),
    }
}

pub async fn nexus_full_sync(ctx: &AppContext) -> Result<usize> {
    let sent = ctx.directory_sync.full_sync().await?;
    info!(users = sent, "Nexus full sync sent members");
    Ok(sent)
}
