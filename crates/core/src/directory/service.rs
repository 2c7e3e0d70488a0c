//! Directory sync service
//!
//! Pushes committed member changes to Nexus. Directory errors are logged
//! and swallowed: a member save never fails because Nexus is down. Without a
//! configured client every call is a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use communaute_domain::{CommunauteError, DirectoryUser, Result, SyncBatch};
use tracing::{debug, error, info, instrument, warn};

use super::ports::{DirectoryClient, SyncDispatcher, UserRepository};

/// Users per `POST /users` call during a full sync.
pub const FULL_SYNC_CHUNK_SIZE: usize = 1000;

/// Sends member changes to the Nexus directory.
pub struct DirectorySyncService {
    client: Option<Arc<dyn DirectoryClient>>,
    users: Arc<dyn UserRepository>,
}

impl DirectorySyncService {
    /// `client` is `None` when the Nexus API base URL is not configured.
    pub fn new(client: Option<Arc<dyn DirectoryClient>>, users: Arc<dyn UserRepository>) -> Self {
        Self { client, users }
    }

    /// Whether a directory client is configured.
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Apply one committed batch: one upsert call and one delete call at
    /// most.
    #[instrument(
        skip(self, batch),
        fields(upserts = batch.upserts.len(), deletes = batch.deletes.len())
    )]
    pub async fn apply(&self, batch: SyncBatch) {
        let Some(client) = &self.client else {
            debug!("Nexus sync disabled, dropping batch");
            return;
        };

        if !batch.upserts.is_empty() {
            let ids: Vec<i64> = batch.upserts.iter().copied().collect();
            match self.users.find_by_ids(&ids).await {
                Ok(users) => {
                    let payload: Vec<DirectoryUser> =
                        users.iter().map(DirectoryUser::from).collect();
                    if payload.is_empty() {
                        debug!("Upserted users no longer exist, nothing to send");
                    } else if let Err(e) = client.send_users(&payload).await {
                        error!(error = %e, count = payload.len(), "Nexus: failed to sync users");
                    }
                }
                Err(e) => error!(error = %e, "Nexus: failed to load users to sync"),
            }
        }

        if !batch.deletes.is_empty() {
            let ids: Vec<i64> = batch.deletes.iter().copied().collect();
            if let Err(e) = client.delete_users(&ids).await {
                error!(error = %e, count = ids.len(), "Nexus: failed to delete users");
            }
        }
    }

    /// Push every published member and close the session so Nexus drops
    /// the rest. Errors are returned to the operator.
    #[instrument(skip(self))]
    pub async fn full_sync(&self) -> Result<usize> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| CommunauteError::Config("Nexus API base URL is not configured".into()))?;

        let started_at = client.start_full_sync().await?;
        let users = self.users.list_published().await?;
        let payload: Vec<DirectoryUser> = users.iter().map(DirectoryUser::from).collect();

        for chunk in payload.chunks(FULL_SYNC_CHUNK_SIZE) {
            client.send_users(chunk).await?;
        }
        client.complete_full_sync(&started_at).await?;

        info!(users = payload.len(), %started_at, "Nexus full sync completed");
        Ok(payload.len())
    }
}

#[async_trait]
impl SyncDispatcher for DirectorySyncService {
    async fn dispatch(&self, batch: SyncBatch) {
        if batch.is_empty() {
            return;
        }
        if !self.is_enabled() {
            warn!("Nexus sync disabled; committed changes are not propagated");
        }
        self.apply(batch).await;
    }
}
