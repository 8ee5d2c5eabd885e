use std::collections::BTreeSet;

use tracing::debug;

use super::collator::is_batch_object;
use crate::storage::{ObjectStore, StoreError};

/// Detects newly arrived CSV objects by diffing successive listings.
///
/// The last-seen snapshot lives in memory only. After a restart the first
/// poll reports every existing object as new.
#[derive(Debug, Clone)]
pub struct BucketWatcher {
    collection: String,
    last_seen: BTreeSet<String>,
}

impl BucketWatcher {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            last_seen: BTreeSet::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn last_seen(&self) -> &BTreeSet<String> {
        &self.last_seen
    }

    /// Lists the collection and returns the CSV objects absent from the
    /// previous listing, in key order. The snapshot is replaced, so removed
    /// objects are reported again if they reappear.
    pub fn poll<S>(&mut self, store: &S) -> Result<Vec<String>, StoreError>
    where
        S: ObjectStore + ?Sized,
    {
        let current: BTreeSet<String> = store
            .list(&self.collection)?
            .into_iter()
            .filter(|object_id| is_batch_object(object_id))
            .collect();

        let fresh: Vec<String> = current.difference(&self.last_seen).cloned().collect();
        debug!(
            collection = %self.collection,
            listed = current.len(),
            fresh = fresh.len(),
            "collection polled"
        );
        self.last_seen = current;
        Ok(fresh)
    }

    /// Drops objects from the snapshot so the next poll reports them again.
    pub fn forget(&mut self, object_ids: &[String]) {
        for object_id in object_ids {
            self.last_seen.remove(object_id);
        }
    }
}
