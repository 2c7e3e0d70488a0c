//! Directory synchronization intents

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::impl_label_conversions;

/// What the external directory must do with a set of users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Upsert,
    Delete,
}

impl_label_conversions!(SyncOperation {
    Upsert => "upsert",
    Delete => "delete",
});

/// Transient classification result of one mutation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIntent {
    pub operation: SyncOperation,
    pub entity_ids: BTreeSet<i64>,
}

impl SyncIntent {
    pub fn upsert(ids: impl IntoIterator<Item = i64>) -> Self {
        Self { operation: SyncOperation::Upsert, entity_ids: ids.into_iter().collect() }
    }

    pub fn delete(ids: impl IntoIterator<Item = i64>) -> Self {
        Self { operation: SyncOperation::Delete, entity_ids: ids.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }
}

/// Intents of one committed transaction, coalesced per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub upserts: BTreeSet<i64>,
    pub deletes: BTreeSet<i64>,
}

impl SyncBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}
