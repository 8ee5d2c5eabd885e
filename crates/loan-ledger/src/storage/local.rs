use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::{ObjectStore, StoreError};
use crate::config::{Credentials, StorageConfig};

/// Filesystem-backed store: one directory per collection under `root`, object
/// ids are `/`-separated paths relative to the collection directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    credentials: Option<Credentials>,
    region: Option<String>,
}

impl LocalObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            credentials: None,
            region: None,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            credentials: config.credentials.clone(),
            region: config.region.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(collection);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::CollectionNotFound {
                collection: collection.to_string(),
            })
        }
    }

    fn object_path(&self, collection: &str, object_id: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(object_id);
        let valid = !object_id.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidObjectId {
                object_id: object_id.to_string(),
            });
        }
        Ok(self.collection_dir(collection)?.join(relative))
    }
}

fn collect_objects(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_objects(base, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let key = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(key);
        }
    }
    Ok(())
}

impl ObjectStore for LocalObjectStore {
    fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.collection_dir(collection)?;
        let mut objects = Vec::new();
        collect_objects(&dir, &dir, &mut objects)?;
        objects.sort();
        Ok(objects)
    }

    fn get(&self, collection: &str, object_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(collection, object_id)?;
        fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::ObjectNotFound {
                collection: collection.to_string(),
                object_id: object_id.to_string(),
            },
            _ => StoreError::Io(err),
        })
    }

    fn put(&self, collection: &str, object_id: &str, body: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(collection, object_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;
        debug!(collection, object = object_id, bytes = body.len(), "object written");
        Ok(())
    }

    fn delete_many(&self, collection: &str, object_ids: &[String]) -> Result<(), StoreError> {
        for object_id in object_ids {
            let path = self.object_path(collection, object_id)?;
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(StoreError::Io(err)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_collection(name: &str) -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(name)).expect("collection dir");
        let store = LocalObjectStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn list_reports_missing_collection_as_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        let err = store.list("absent").expect_err("missing collection");
        assert!(err.is_configuration());
    }

    #[test]
    fn put_then_list_uses_slash_separated_keys() {
        let (_dir, store) = store_with_collection("complete-table");
        store
            .put("complete-table", "batch-7/A1.csv", b"bvn\nB1\n")
            .expect("put nested");
        store
            .put("complete-table", "A0.csv", b"bvn\nB0\n")
            .expect("put flat");

        let objects = store.list("complete-table").expect("list");
        assert_eq!(objects, vec!["A0.csv".to_string(), "batch-7/A1.csv".to_string()]);
        assert_eq!(
            store.get("complete-table", "batch-7/A1.csv").expect("get"),
            b"bvn\nB1\n".to_vec()
        );
    }

    #[test]
    fn get_distinguishes_missing_objects() {
        let (_dir, store) = store_with_collection("inbox");
        match store.get("inbox", "nope.csv") {
            Err(StoreError::ObjectNotFound { object_id, .. }) => assert_eq!(object_id, "nope.csv"),
            other => panic!("expected object not found, got {other:?}"),
        }
    }

    #[test]
    fn rejects_keys_escaping_the_collection() {
        let (_dir, store) = store_with_collection("inbox");
        assert!(matches!(
            store.put("inbox", "../outside.csv", b"x"),
            Err(StoreError::InvalidObjectId { .. })
        ));
        assert!(matches!(
            store.get("inbox", "/etc/passwd"),
            Err(StoreError::InvalidObjectId { .. })
        ));
    }

    #[test]
    fn delete_many_ignores_already_removed_objects() {
        let (_dir, store) = store_with_collection("inbox");
        store.put("inbox", "a.csv", b"x").expect("put");
        store
            .delete_many("inbox", &["a.csv".to_string(), "b.csv".to_string()])
            .expect("delete");
        assert!(store.list("inbox").expect("list").is_empty());
    }
}
