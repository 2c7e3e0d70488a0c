//! Transaction-scoped deferred directory intents
//!
//! Intents are collected while a transaction runs and turned into a single
//! [`SyncBatch`] when it commits. Dropping the queue (rollback) discards
//! them. Per id the last intent wins, so an upsert followed by a delete in
//! the same transaction only deletes.

use std::collections::BTreeMap;

use communaute_domain::{SyncBatch, SyncIntent, SyncOperation};

/// Intents of one open transaction, keyed by member id.
#[derive(Debug, Default)]
pub struct CommitQueue {
    pending: BTreeMap<i64, SyncOperation>,
}

impl CommitQueue {
    /// Empty queue for a new transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent, replacing earlier intents for the same ids.
    pub fn push(&mut self, intent: SyncIntent) {
        for id in intent.entity_ids {
            self.pending.insert(id, intent.operation);
        }
    }

    /// Record several intents in order.
    pub fn extend(&mut self, intents: impl IntoIterator<Item = SyncIntent>) {
        for intent in intents {
            self.push(intent);
        }
    }

    /// Whether nothing would be sent on commit.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of distinct member ids pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Consume the queue at commit time.
    pub fn into_batch(self) -> SyncBatch {
        let mut batch = SyncBatch::default();
        for (id, operation) in self.pending {
            match operation {
                SyncOperation::Upsert => batch.upserts.insert(id),
                SyncOperation::Delete => batch.deletes.insert(id),
            };
        }
        batch
    }

    /// Discard everything collected so far.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
