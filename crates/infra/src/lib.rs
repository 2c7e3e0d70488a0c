//! # Communauté Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories (watermarks, stats, users with directory sync)
//! - The retrying HTTP client
//! - Matomo and Nexus integrations
//! - Configuration loading and the stats scheduler
//!
//! ## Architecture
//! - Implements traits defined in `communaute-core`
//! - Contains all "impure" code (I/O, network, clocks on the wall)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::*;
pub use integrations::*;
pub use scheduling::{SchedulerError, SchedulerResult, StatsScheduler};
