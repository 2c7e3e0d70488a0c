//! Incremental analytics backfill

pub mod planner;
pub mod ports;
pub mod service;

pub use planner::WindowPlanner;
pub use service::{CollectionSummary, StatsCollectionService};
