use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::records::LedgerRecord;
use crate::storage::{ObjectStore, StoreError};

/// Failure while staging or uploading finalised ledger rows.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to stage {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode ledger rows: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to upload ledger rows: {0}")]
    Store(#[from] StoreError),
}

/// Writes finalised ledger rows, one CSV per application, to a local staging
/// directory for audit and then to the complete-table collection.
#[derive(Debug, Clone)]
pub struct LedgerSink {
    staging_dir: PathBuf,
    collection: String,
}

/// File name for one application's rows; path separators never reach the filesystem.
pub fn object_name(application_id: &str) -> String {
    let safe = application_id.replace(['/', '\\'], "_");
    format!("{safe}.csv")
}

/// Key of the uploaded object: the application file under the first path
/// segment of the row's source object, so a row overwrites the object it was read from.
pub fn object_key(row: &LedgerRecord) -> String {
    let name = object_name(&row.application_id);
    match row.file_key.split_once('/') {
        Some((prefix, _)) if !prefix.is_empty() => format!("{prefix}/{name}"),
        _ => name,
    }
}

pub fn encode_rows(rows: &[&LedgerRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

impl LedgerSink {
    pub fn new<P: Into<PathBuf>>(staging_dir: P, collection: impl Into<String>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            collection: collection.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Persists `rows` grouped by `application_id`, returning the keys written.
    pub fn persist<S>(&self, store: &S, rows: &[LedgerRecord]) -> Result<Vec<String>, SinkError>
    where
        S: ObjectStore + ?Sized,
    {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups: BTreeMap<&str, Vec<&LedgerRecord>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.application_id.as_str()).or_default().push(row);
        }

        fs::create_dir_all(&self.staging_dir).map_err(|source| SinkError::Staging {
            path: self.staging_dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(groups.len());
        for (application_id, group) in groups {
            let body = encode_rows(&group)?;

            let staged = self.staging_dir.join(object_name(application_id));
            fs::write(&staged, &body).map_err(|source| SinkError::Staging {
                path: staged.clone(),
                source,
            })?;

            let key = object_key(group[0]);
            store.put(&self.collection, &key, &body)?;
            debug!(collection = %self.collection, object = %key, rows = group.len(), "ledger rows uploaded");
            written.push(key);
        }

        info!(
            collection = %self.collection,
            objects = written.len(),
            staging = %self.staging_dir.display(),
            "files saved successfully"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;

    fn row(application_id: &str, file_key: &str) -> LedgerRecord {
        LedgerRecord {
            bvn: "B1".to_string(),
            dob: None,
            amount_requested: Some("5000".to_string()),
            application_id: application_id.to_string(),
            loan_tenure: None,
            loan_repayment_structure: None,
            internal_id: None,
            amount_approved: Some("1000.0".to_string()),
            created_date: None,
            updated_date: Some("2025-07-01 09:41:00".to_string()),
            decline_reason: Some(String::new()),
            loan_message: Some("Completed".to_string()),
            file_key: file_key.to_string(),
        }
    }

    #[test]
    fn object_key_reuses_source_prefix() {
        assert_eq!(object_key(&row("A1", "batch-9/A1.csv")), "batch-9/A1.csv");
        assert_eq!(object_key(&row("A1", "A1.csv")), "A1.csv");
        assert_eq!(object_key(&row("A/1", "")), "A_1.csv");
    }

    #[test]
    fn encoded_rows_use_canonical_column_order() {
        let record = row("A1", "batch-9/A1.csv");
        let encoded = String::from_utf8(encode_rows(&[&record]).expect("encode")).expect("utf8");
        let mut lines = encoded.lines();
        assert_eq!(
            lines.next(),
            Some("bvn,dob,amount_requested,application_id,loan_tenure,loan_repayment_structure,internal_id,amount_approved,created_date,updated_date,decline_reason,loan_message,file_key")
        );
        assert_eq!(
            lines.next(),
            Some("B1,,5000,A1,,,,1000.0,,2025-07-01 09:41:00,,Completed,batch-9/A1.csv")
        );
    }

    #[test]
    fn persist_stages_and_uploads_one_object_per_application() {
        let staging = tempfile::tempdir().expect("tempdir");
        let store = MemoryObjectStore::new();
        store.create_collection("complete-table").unwrap();
        let sink = LedgerSink::new(staging.path().join("staged"), "complete-table");

        let rows = vec![
            row("A2", "batch-9/A2.csv"),
            row("A1", "batch-9/A1.csv"),
            row("A1", "batch-9/A1.csv"),
        ];
        let written = sink.persist(&store, &rows).expect("persist");

        assert_eq!(written, vec!["batch-9/A1.csv", "batch-9/A2.csv"]);
        assert!(staging.path().join("staged/A1.csv").is_file());
        assert!(staging.path().join("staged/A2.csv").is_file());
        let uploaded = store
            .read_string("complete-table", "batch-9/A1.csv")
            .expect("uploaded");
        assert_eq!(uploaded.lines().count(), 3);
    }

    #[test]
    fn persist_surfaces_store_failures() {
        let staging = tempfile::tempdir().expect("tempdir");
        let store = MemoryObjectStore::new();
        let sink = LedgerSink::new(staging.path(), "complete-table");
        match sink.persist(&store, &[row("A1", "A1.csv")]) {
            Err(SinkError::Store(StoreError::CollectionNotFound { .. })) => {}
            other => panic!("expected missing collection, got {other:?}"),
        }
    }
}
