//! Domain types and models

pub mod auth;
pub mod stats;
pub mod sync;
pub mod user;

pub use auth::AutoLoginClaims;
pub use stats::{Granularity, MetricRecord, RunReport, SyncWindow, Watermark};
pub use sync::{SyncBatch, SyncIntent, SyncOperation};
pub use user::{
    DirectoryUser, DirectoryUserRef, IdentityProvider, NewUser, User, UserChanges, UserFilter,
};
