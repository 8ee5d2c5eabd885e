use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use super::coercion::coerce_columns;
use super::collator::{CollateError, CollatedBatch, RecordCollator};
use super::joiner::join_default_history;
use super::ledger::reconcile;
use super::records::{
    DefaultHistoryRecord, LedgerRecord, ScoredRecord, TransactionRecord, DEFAULT_HISTORY_REQUIRED,
    DEFAULT_HISTORY_SCHEMA, LEDGER_REQUIRED, LEDGER_SCHEMA, TRANSACTION_REQUIRED,
    TRANSACTION_SCHEMA,
};
use super::scoring::{ScoringEngine, ScoringError};
use super::sink::{LedgerSink, SinkError};
use super::watcher::BucketWatcher;
use crate::config::PipelineConfig;
use crate::storage::{ObjectStore, StoreError};

/// Which transaction objects a cycle reads.
#[derive(Debug, Clone, Copy)]
pub enum ObjectSelection<'a> {
    /// Every CSV object in the collection.
    All,
    /// Only the listed objects, typically the ones a poll just detected.
    Only(&'a [String]),
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// No transaction rows survived collation.
    NoData,
    /// Records were scored but no unprocessed ledger row matched.
    NoOutcome,
    /// Finalised ledger rows were written.
    Completed,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::NoData => "no_data",
            CycleOutcome::NoOutcome => "no_outcome",
            CycleOutcome::Completed => "completed",
        }
    }
}

/// Structured summary of one ingestion cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub objects_read: usize,
    pub objects_skipped: usize,
    pub transactions: usize,
    /// Distinct `(bvn, application_id)` pairs scored. Default-history fan-out
    /// is not counted twice.
    pub scored: usize,
    pub scoring_failures: usize,
    pub ledger_rows_completed: usize,
    pub objects_written: Vec<String>,
    pub objects_purged: usize,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn empty(outcome: CycleOutcome) -> Self {
        Self {
            objects_read: 0,
            objects_skipped: 0,
            transactions: 0,
            scored: 0,
            scoring_failures: 0,
            ledger_rows_completed: 0,
            objects_written: Vec::new(),
            objects_purged: 0,
            outcome,
        }
    }
}

/// Scored transactions of one selection, before reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ScoredBatch {
    /// Transaction objects that were read successfully.
    pub objects: Vec<String>,
    pub objects_skipped: usize,
    pub transactions: usize,
    pub scored: Vec<ScoredRecord>,
    pub failures: Vec<ScoringError>,
}

impl ScoredBatch {
    /// Number of distinct applications among the scored rows.
    pub fn applications(&self) -> usize {
        self.scored
            .iter()
            .map(|record| (record.bvn(), record.application_id()))
            .collect::<HashSet<_>>()
            .len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("configuration error: {0}")]
    Configuration(#[from] CollateError),
    #[error("failed to persist ledger rows: {0}")]
    Sink(#[from] SinkError),
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}

impl CycleError {
    /// Fatal errors halt the watch loop; anything else ends only the current cycle.
    pub fn is_fatal(&self) -> bool {
        match self {
            CycleError::Configuration(_) => true,
            CycleError::Sink(SinkError::Store(err)) | CycleError::Store(err) => {
                err.is_configuration()
            }
            CycleError::Sink(_) => false,
        }
    }
}

/// Runs collate, coerce, join, score, reconcile and persist against one store.
pub struct ScoringPipeline<S> {
    store: Arc<S>,
    engine: ScoringEngine,
    sink: LedgerSink,
    transactions_collection: String,
    defaults_collection: String,
    complete_table_collection: String,
    purge_processed: bool,
}

impl<S> ScoringPipeline<S>
where
    S: ObjectStore + 'static,
{
    pub fn new(store: Arc<S>, config: &PipelineConfig) -> Self {
        Self {
            store,
            engine: ScoringEngine::new(),
            sink: LedgerSink::new(
                config.staging_dir.clone(),
                config.complete_table_collection.clone(),
            ),
            transactions_collection: config.transactions_collection.clone(),
            defaults_collection: config.defaults_collection.clone(),
            complete_table_collection: config.complete_table_collection.clone(),
            purge_processed: config.purge_processed,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn transactions_collection(&self) -> &str {
        &self.transactions_collection
    }

    /// Runs one full cycle. Re-running over an already finalised ledger
    /// completes nothing and writes nothing.
    pub fn run_cycle(
        &self,
        selection: ObjectSelection<'_>,
        now: NaiveDateTime,
    ) -> Result<CycleReport, CycleError> {
        let report = self.execute(selection, now)?;

        metrics::counter!("loan_ledger_cycles_total", "outcome" => report.outcome.label())
            .increment(1);
        info!(
            outcome = report.outcome.label(),
            objects_read = report.objects_read,
            objects_skipped = report.objects_skipped,
            transactions = report.transactions,
            scored = report.scored,
            scoring_failures = report.scoring_failures,
            completed = report.ledger_rows_completed,
            written = report.objects_written.len(),
            "cycle finished"
        );
        Ok(report)
    }

    /// Collates, coerces, joins and scores the selected transactions without
    /// touching the ledger.
    pub fn score(
        &self,
        selection: ObjectSelection<'_>,
        now: NaiveDateTime,
    ) -> Result<ScoredBatch, CycleError> {
        let collator = RecordCollator::new(self.store.as_ref());

        let batch = match selection {
            ObjectSelection::All => {
                collator.collate(&self.transactions_collection, &TRANSACTION_REQUIRED)?
            }
            ObjectSelection::Only(object_ids) => collator.collate_objects(
                &self.transactions_collection,
                object_ids,
                &TRANSACTION_REQUIRED,
            )?,
        };
        let CollatedBatch {
            mut table,
            objects,
            skipped,
        } = batch;

        table.retain(|row| !row.get("application_id").is_null());
        coerce_columns(&mut table, &TRANSACTION_SCHEMA);
        let transactions = TransactionRecord::from_table(&table);

        let mut scored_batch = ScoredBatch {
            objects,
            objects_skipped: skipped.len(),
            transactions: transactions.len(),
            scored: Vec::new(),
            failures: Vec::new(),
        };
        if transactions.is_empty() {
            info!(collection = %self.transactions_collection, "no data for processing");
            return Ok(scored_batch);
        }

        let mut defaults = collator.collate(&self.defaults_collection, &DEFAULT_HISTORY_REQUIRED)?;
        coerce_columns(&mut defaults.table, &DEFAULT_HISTORY_SCHEMA);
        let history = DefaultHistoryRecord::from_table(&defaults.table);

        let enriched = join_default_history(transactions, &history, now);
        let (scored, failures) = self.engine.score_all(enriched);
        for failure in &failures {
            warn!(error = %failure, "record could not be scored");
        }
        scored_batch.scored = scored;
        scored_batch.failures = failures;
        metrics::counter!("loan_ledger_records_scored_total")
            .increment(scored_batch.applications() as u64);
        Ok(scored_batch)
    }

    fn execute(
        &self,
        selection: ObjectSelection<'_>,
        now: NaiveDateTime,
    ) -> Result<CycleReport, CycleError> {
        let batch = self.score(selection, now)?;

        let mut report = CycleReport::empty(CycleOutcome::NoData);
        report.objects_read = batch.objects.len();
        report.objects_skipped = batch.objects_skipped;
        report.transactions = batch.transactions;
        report.scored = batch.applications();
        report.scoring_failures = batch.failures.len();
        if batch.transactions == 0 {
            return Ok(report);
        }

        let collator = RecordCollator::new(self.store.as_ref());
        let mut ledger_batch =
            collator.collate(&self.complete_table_collection, &LEDGER_REQUIRED)?;
        coerce_columns(&mut ledger_batch.table, &LEDGER_SCHEMA);
        let ledger = LedgerRecord::from_table(&ledger_batch.table);

        let reconciliation = reconcile(ledger, &batch.scored, now);
        if reconciliation.delta.is_empty() {
            info!(
                collection = %self.complete_table_collection,
                "no unprocessed ledger rows matched this batch"
            );
            report.outcome = CycleOutcome::NoOutcome;
            return Ok(report);
        }

        let written = self.sink.persist(self.store.as_ref(), &reconciliation.delta)?;
        metrics::counter!("loan_ledger_ledger_rows_completed_total")
            .increment(reconciliation.delta.len() as u64);
        report.ledger_rows_completed = reconciliation.delta.len();
        report.objects_written = written;
        report.outcome = CycleOutcome::Completed;

        if self.purge_processed && !batch.objects.is_empty() {
            self.store
                .delete_many(&self.transactions_collection, &batch.objects)?;
            info!(
                collection = %self.transactions_collection,
                objects = batch.objects.len(),
                "processed objects purged"
            );
            report.objects_purged = batch.objects.len();
        }

        Ok(report)
    }
}

/// Pairs a pipeline with the watcher that decides what each tick reads.
pub struct Orchestrator<S> {
    pipeline: ScoringPipeline<S>,
    watcher: BucketWatcher,
}

impl<S> Orchestrator<S>
where
    S: ObjectStore + 'static,
{
    pub fn new(pipeline: ScoringPipeline<S>) -> Self {
        let watcher = BucketWatcher::new(pipeline.transactions_collection());
        Self { pipeline, watcher }
    }

    pub fn pipeline(&self) -> &ScoringPipeline<S> {
        &self.pipeline
    }

    /// Polls for new transaction objects and, when there are any, runs one
    /// cycle over exactly those. Objects from a cycle that failed are retried
    /// on the next tick.
    pub fn tick(&mut self, now: NaiveDateTime) -> Result<Option<CycleReport>, CycleError> {
        let fresh = self
            .watcher
            .poll(self.pipeline.store().as_ref())
            .map_err(|source| {
                if source.is_configuration() {
                    CycleError::Configuration(CollateError::Unreachable {
                        collection: self.watcher.collection().to_string(),
                        source,
                    })
                } else {
                    CycleError::Store(source)
                }
            })?;

        if fresh.is_empty() {
            return Ok(None);
        }

        info!(
            collection = %self.watcher.collection(),
            objects = fresh.len(),
            "new objects detected"
        );
        match self.pipeline.run_cycle(ObjectSelection::Only(&fresh), now) {
            Ok(report) => Ok(Some(report)),
            Err(err) => {
                self.watcher.forget(&fresh);
                Err(err)
            }
        }
    }
}
