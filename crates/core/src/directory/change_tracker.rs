//! Classification of member mutations into directory intents
//!
//! Tracked fields are the ones the directory stores: id, names, email, last
//! login, identity provider, `is_active` and `is_staff`. Losing liveness
//! (inactive, staff, or blank email) turns any tracked change into a delete.

use communaute_domain::{SyncIntent, SyncOperation, User};

/// Turns member mutations into directory intents.
pub struct ChangeTracker;

impl ChangeTracker {
    /// Classify a single save. `before` is `None` on create.
    pub fn classify(before: Option<&User>, after: &User) -> Option<SyncIntent> {
        if let Some(before) = before {
            if !before.tracked_fields_differ(after) {
                return None;
            }
        }

        if after.is_published() {
            Some(SyncIntent::upsert([after.id]))
        } else {
            Some(SyncIntent::delete([after.id]))
        }
    }

    /// Classify a bulk update row by row, batching ids per operation.
    ///
    /// Returns at most one upsert and one delete intent.
    pub fn classify_bulk<'a, I>(rows: I) -> Vec<SyncIntent>
    where
        I: IntoIterator<Item = (&'a User, &'a User)>,
    {
        let mut upserts = Vec::new();
        let mut deletes = Vec::new();
        for (before, after) in rows {
            if let Some(intent) = Self::classify(Some(before), after) {
                match intent.operation {
                    SyncOperation::Upsert => upserts.extend(intent.entity_ids),
                    SyncOperation::Delete => deletes.extend(intent.entity_ids),
                }
            }
        }

        let mut intents = Vec::new();
        if !upserts.is_empty() {
            intents.push(SyncIntent::upsert(upserts));
        }
        if !deletes.is_empty() {
            intents.push(SyncIntent::delete(deletes));
        }
        intents
    }

    /// Explicit (single or bulk) delete. Ids must be captured before the
    /// rows disappear.
    pub fn classify_delete(ids: impl IntoIterator<Item = i64>) -> Option<SyncIntent> {
        let intent = SyncIntent::delete(ids);
        (!intent.is_empty()).then_some(intent)
    }
}
