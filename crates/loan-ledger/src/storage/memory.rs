use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ObjectStore, StoreError};

type Collections = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// In-process store used by tests and the `score` demo path.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    collections: Arc<Mutex<Collections>>,
    unreadable: Arc<Mutex<HashSet<(String, String)>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection; existing contents are kept.
    pub fn create_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.lock()?.entry(collection.to_string()).or_default();
        Ok(())
    }

    /// Inserts an object, creating the collection on demand.
    pub fn insert(&self, collection: &str, object_id: &str, body: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(object_id.to_string(), body.into());
        Ok(())
    }

    /// Makes subsequent `get` calls for the object fail, simulating a corrupt read.
    pub fn mark_unreadable(&self, collection: &str, object_id: &str) -> Result<(), StoreError> {
        self.unreadable
            .lock()
            .map_err(|_| poisoned())?
            .insert((collection.to_string(), object_id.to_string()));
        Ok(())
    }

    /// Decoded contents of one object, for assertions.
    pub fn read_string(&self, collection: &str, object_id: &str) -> Option<String> {
        let guard = self.lock().ok()?;
        let body = guard.get(collection)?.get(object_id)?;
        String::from_utf8(body.clone()).ok()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections.lock().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

fn missing(collection: &str) -> StoreError {
    StoreError::CollectionNotFound {
        collection: collection.to_string(),
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let guard = self.lock()?;
        let objects = guard.get(collection).ok_or_else(|| missing(collection))?;
        Ok(objects.keys().cloned().collect())
    }

    fn get(&self, collection: &str, object_id: &str) -> Result<Vec<u8>, StoreError> {
        let unreadable = self
            .unreadable
            .lock()
            .map_err(|_| poisoned())?
            .contains(&(collection.to_string(), object_id.to_string()));
        if unreadable {
            return Err(StoreError::Unavailable(format!(
                "object '{object_id}' could not be read"
            )));
        }

        let guard = self.lock()?;
        let objects = guard.get(collection).ok_or_else(|| missing(collection))?;
        objects
            .get(object_id)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                collection: collection.to_string(),
                object_id: object_id.to_string(),
            })
    }

    fn put(&self, collection: &str, object_id: &str, body: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let objects = guard.get_mut(collection).ok_or_else(|| missing(collection))?;
        objects.insert(object_id.to_string(), body.to_vec());
        Ok(())
    }

    fn delete_many(&self, collection: &str, object_ids: &[String]) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let objects = guard.get_mut(collection).ok_or_else(|| missing(collection))?;
        for object_id in object_ids {
            objects.remove(object_id);
        }
        Ok(())
    }
}
