//! Cron-based trigger for the analytics backfill.
//!
//! A tick that fires while the previous collection is still running is
//! skipped, so there is never more than one run in flight. Runs are never
//! cancelled: a run outlasting `slow_run_after` is only reported, and every
//! window it has started is persisted before the next tick may begin.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use communaute_common::Clock;
use communaute_core::StatsCollectionService;
use communaute_domain::{Result as DomainResult, StatsConfig};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Work executed on every tick.
#[async_trait]
pub trait StatsJob: Send + Sync {
    async fn run(&self) -> DomainResult<()>;
}

/// Collects both granularities up to the clock's current day.
pub struct CollectStatsJob {
    service: Arc<StatsCollectionService>,
    clock: Arc<dyn Clock>,
}

impl CollectStatsJob {
    pub fn new(service: Arc<StatsCollectionService>, clock: Arc<dyn Clock>) -> Self {
        Self { service, clock }
    }
}

#[async_trait]
impl StatsJob for CollectStatsJob {
    async fn run(&self) -> DomainResult<()> {
        let summary = self.service.run_all(self.clock.today()).await?;
        for (granularity, failure) in &summary.failures {
            warn!(
                %granularity,
                error = %failure,
                "Scheduled stats collection failed for granularity"
            );
        }
        info!(
            records_inserted = summary.records_inserted(),
            failures = summary.failures.len(),
            "Scheduled stats collection finished"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StatsSchedulerConfig {
    /// Six-field cron expression (with seconds).
    pub cron_expression: String,
    /// Elapsed time after which a still-running collection is logged as slow.
    pub slow_run_after: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    pub join_timeout: Duration,
}

impl Default for StatsSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: StatsConfig::default().cron_expression,
            slow_run_after: Duration::from_secs(3600),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&StatsConfig> for StatsSchedulerConfig {
    fn from(config: &StatsConfig) -> Self {
        Self { cron_expression: config.cron_expression.clone(), ..Self::default() }
    }
}

/// Run counters, readable while the scheduler is running.
#[derive(Debug, Default)]
struct TickStats {
    completed: AtomicUsize,
    skipped: AtomicUsize,
    slow: AtomicUsize,
}

pub struct StatsScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: StatsSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    in_flight: Arc<AtomicBool>,
    ticks: Arc<TickStats>,
}

impl StatsScheduler {
    pub async fn new(
        config: StatsSchedulerConfig,
        job: Arc<dyn StatsJob>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(TickStats::default()),
        };

        scheduler.register(job).await?;
        Ok(scheduler)
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, async move { scheduler.read().await.start().await })
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("Stats scheduler monitor cancelled");
        }));

        info!(cron = %self.config.cron_expression, "Stats scheduler started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.write().await.shutdown().await })
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Stats scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Ticks that ran the job to completion (success or failure).
    pub fn completed_runs(&self) -> usize {
        self.ticks.completed.load(Ordering::SeqCst)
    }

    /// Ticks dropped because a run was still in flight.
    pub fn skipped_ticks(&self) -> usize {
        self.ticks.skipped.load(Ordering::SeqCst)
    }

    /// Runs that outlasted `slow_run_after`.
    pub fn slow_runs(&self) -> usize {
        self.ticks.slow.load(Ordering::SeqCst)
    }

    async fn register(&self, job: Arc<dyn StatsJob>) -> SchedulerResult<()> {
        let in_flight = self.in_flight.clone();
        let ticks = self.ticks.clone();
        let slow_run_after = self.config.slow_run_after;

        let definition = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let in_flight = in_flight.clone();
            let ticks = ticks.clone();
            let job = job.clone();

            Box::pin(async move {
                if in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    ticks.skipped.fetch_add(1, Ordering::SeqCst);
                    warn!("Previous stats collection still running, skipping tick");
                    return;
                }

                let started = Instant::now();
                let run = job.run();
                tokio::pin!(run);
                let outcome = match tokio::time::timeout(slow_run_after, &mut run).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        ticks.slow.fetch_add(1, Ordering::SeqCst);
                        warn!(
                            threshold_secs = slow_run_after.as_secs(),
                            "Stats job is slow, waiting for it to finish"
                        );
                        run.await
                    }
                };

                let elapsed_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(()) => debug!(elapsed_ms, "Stats job finished"),
                    Err(err) if err.is_fatal() => {
                        error!(error = %err, fatal = true, elapsed_ms, "Stats job aborted");
                    }
                    Err(err) => error!(error = %err, elapsed_ms, "Stats job failed"),
                }

                ticks.completed.fetch_add(1, Ordering::SeqCst);
                in_flight.store(false, Ordering::SeqCst);
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = self
            .scheduler
            .read()
            .await
            .add(definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, %job_id, "Registered stats collection job");
        Ok(())
    }
}

impl Drop for StatsScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("StatsScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
