//! Loan scoring pipeline: collate raw batches, coerce types, join default
//! history, score, and reconcile outcomes into the complete table.

pub mod coercion;
pub mod collator;
pub mod joiner;
pub mod ledger;
pub mod orchestrator;
pub mod records;
pub mod scoring;
pub mod sink;
pub mod table;
pub mod watcher;

pub use coercion::{coerce_columns, ColumnType, CoercionReport};
pub use collator::{CollateError, CollatedBatch, RecordCollator, SkipReason, SkippedObject};
pub use joiner::{default_flags, join_default_history, DEFAULT_LOOKBACK_DAYS};
pub use ledger::{reconcile, updated_stamp, Reconciliation, COMPLETED_MESSAGE};
pub use orchestrator::{
    CycleError, CycleOutcome, CycleReport, ObjectSelection, Orchestrator, ScoredBatch,
    ScoringPipeline,
};
pub use records::{
    DefaultHistoryRecord, EnrichedRecord, LedgerRecord, ScoredRecord, TransactionRecord, YesNo,
};
pub use scoring::{scored_to_csv, ScoringEngine, ScoringError};
pub use sink::{LedgerSink, SinkError};
pub use table::{Table, Value};
pub use watcher::BucketWatcher;
