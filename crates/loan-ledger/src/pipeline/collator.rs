use std::io::Cursor;

use tracing::{debug, info, warn};

use super::records::FILE_KEY;
use super::table::{Table, Value};
use crate::storage::{ObjectStore, StoreError};

/// Why an object was left out of a collated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The object could not be fetched.
    Unreadable(String),
    /// The object was fetched but is not valid UTF-8 CSV.
    Malformed(String),
    /// Required columns are missing.
    MissingColumns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub object_id: String,
    pub reason: SkipReason,
}

/// Union of every readable object in a collection, tagged with `file_key`.
#[derive(Debug, Clone, Default)]
pub struct CollatedBatch {
    pub table: Table,
    pub objects: Vec<String>,
    pub skipped: Vec<SkippedObject>,
}

/// Collation failure that invalidates the whole cycle.
#[derive(Debug, thiserror::Error)]
pub enum CollateError {
    #[error("collection '{collection}' is unreachable: {source}")]
    Unreachable {
        collection: String,
        #[source]
        source: StoreError,
    },
}

/// Only CSV exports take part in collation.
pub fn is_batch_object(object_id: &str) -> bool {
    object_id.to_ascii_lowercase().ends_with(".csv")
}

/// Lists, fetches and unions the CSV objects of one collection.
pub struct RecordCollator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> RecordCollator<'a, S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Every CSV object currently in `collection`.
    pub fn collate(&self, collection: &str, required: &[&str]) -> Result<CollatedBatch, CollateError> {
        let objects = self
            .store
            .list(collection)
            .map_err(|source| CollateError::Unreachable {
                collection: collection.to_string(),
                source,
            })?
            .into_iter()
            .filter(|object_id| is_batch_object(object_id))
            .collect::<Vec<_>>();

        self.collate_objects(collection, &objects, required)
    }

    /// Only the named objects, in the order given.
    pub fn collate_objects(
        &self,
        collection: &str,
        object_ids: &[String],
        required: &[&str],
    ) -> Result<CollatedBatch, CollateError> {
        let mut tables = Vec::new();
        let mut objects = Vec::new();
        let mut skipped = Vec::new();

        for object_id in object_ids {
            match self.read_object(collection, object_id, required)? {
                Ok(table) => {
                    debug!(collection, object = %object_id, rows = table.len(), "object collated");
                    tables.push(table);
                    objects.push(object_id.clone());
                }
                Err(reason) => {
                    warn!(collection, object = %object_id, ?reason, "object excluded from batch");
                    metrics::counter!("loan_ledger_objects_skipped_total").increment(1);
                    skipped.push(SkippedObject {
                        object_id: object_id.clone(),
                        reason,
                    });
                }
            }
        }

        if tables.is_empty() {
            info!(collection, "no objects to merge");
        }

        Ok(CollatedBatch {
            table: Table::concat(tables),
            objects,
            skipped,
        })
    }

    /// Outer error aborts the cycle; inner error skips just this object.
    fn read_object(
        &self,
        collection: &str,
        object_id: &str,
        required: &[&str],
    ) -> Result<Result<Table, SkipReason>, CollateError> {
        let body = match self.store.get(collection, object_id) {
            Ok(body) => body,
            Err(source) if source.is_configuration() => {
                return Err(CollateError::Unreachable {
                    collection: collection.to_string(),
                    source,
                })
            }
            Err(err) => return Ok(Err(SkipReason::Unreadable(err.to_string()))),
        };

        let mut table = match Table::from_csv(Cursor::new(body)) {
            Ok(table) => table,
            Err(err) => return Ok(Err(SkipReason::Malformed(err.to_string()))),
        };

        let missing = required
            .iter()
            .filter(|column| !table.has_column(column))
            .map(|column| column.to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Ok(Err(SkipReason::MissingColumns(missing)));
        }

        table.fill_column(FILE_KEY, Value::Text(object_id.to_string()));
        Ok(Ok(table))
    }
}
