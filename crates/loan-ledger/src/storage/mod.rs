//! Object storage capability consumed by the pipeline.
//!
//! The pipeline only ever sees the [`ObjectStore`] trait; bucket layout,
//! credentials and transport belong to the implementation handed in at
//! construction.

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Storage abstraction so the pipeline can be exercised without a real bucket.
pub trait ObjectStore: Send + Sync {
    /// Every object id in the collection, sorted.
    fn list(&self, collection: &str) -> Result<Vec<String>, StoreError>;
    fn get(&self, collection: &str, object_id: &str) -> Result<Vec<u8>, StoreError>;
    fn put(&self, collection: &str, object_id: &str, body: &[u8]) -> Result<(), StoreError>;
    fn delete_many(&self, collection: &str, object_ids: &[String]) -> Result<(), StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("collection '{collection}' does not exist or is not accessible")]
    CollectionNotFound { collection: String },
    #[error("object '{object_id}' not found in collection '{collection}'")]
    ObjectNotFound {
        collection: String,
        object_id: String,
    },
    #[error("object id '{object_id}' is not a valid relative key")]
    InvalidObjectId { object_id: String },
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the failure concerns the collection itself rather than one object.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StoreError::CollectionNotFound { .. })
    }
}
