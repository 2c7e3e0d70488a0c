//! Cron-driven background jobs
//!
//! Schedulers own their join handles and cancellation token and wrap every
//! lifecycle call in a timeout.

pub mod error;
pub mod stats_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use stats_scheduler::{CollectStatsJob, StatsJob, StatsScheduler, StatsSchedulerConfig};
