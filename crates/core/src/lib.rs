//! # Communauté Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Analytics backfill: window planning and the collection executor
//! - Directory sync: change classification, commit queue, sync service
//! - Auto-login: token codec and the per-request flow
//! - Port interfaces (traits) implemented by `communaute-infra`
//!
//! ## Architecture Principles
//! - Only depends on `communaute-common` and `communaute-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod auto_login;
pub mod directory;
pub mod stats;

pub use auto_login::{
    AutoLoginDecision, AutoLoginFlow, AutoLoginRequest, AutoLoginState, TokenCodec, TokenError,
};
pub use directory::ports::{DirectoryClient, SyncDispatcher, UserRepository};
pub use directory::{ChangeTracker, CommitQueue, DirectorySyncService};
pub use stats::ports::{AnalyticsSource, StatRecordStore, WatermarkStore};
pub use stats::{CollectionSummary, StatsCollectionService, WindowPlanner};
