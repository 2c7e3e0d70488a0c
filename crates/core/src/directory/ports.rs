//! Port interfaces for directory sync

use async_trait::async_trait;
use communaute_domain::{DirectoryUser, Result, SyncBatch, User};

/// Remote user directory (Nexus)
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn send_users(&self, users: &[DirectoryUser]) -> Result<()>;

    async fn delete_users(&self, ids: &[i64]) -> Result<()>;

    /// Open a full-sync session; returns the directory's `started_at` marker.
    async fn start_full_sync(&self) -> Result<String>;

    /// Close a full-sync session. Users not sent since `started_at` are
    /// dropped by the directory.
    async fn complete_full_sync(&self, started_at: &str) -> Result<()>;
}

/// Read access to forum members
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Active, non-staff members with an email.
    async fn list_published(&self) -> Result<Vec<User>>;
}

/// Receives the coalesced intents of a committed transaction.
///
/// Implementations must not fail the caller: the entity-save path never
/// sees directory errors.
#[async_trait]
pub trait SyncDispatcher: Send + Sync {
    async fn dispatch(&self, batch: SyncBatch);
}
