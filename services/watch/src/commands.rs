use crate::infra::{now_or_local, parse_now};
use chrono::NaiveDateTime;
use clap::Args;
use loan_ledger::config::{AppConfig, PipelineConfig};
use loan_ledger::error::AppError;
use loan_ledger::pipeline::{scored_to_csv, CycleError, ObjectSelection, ScoringPipeline};
use loan_ledger::storage::{LocalObjectStore, MemoryObjectStore};
use loan_ledger::telemetry;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Default)]
pub(crate) struct RunOnceArgs {
    /// Evaluation time for the 90-day rule and `updated_date` (defaults to now)
    #[arg(long, value_parser = parse_now)]
    pub(crate) now: Option<NaiveDateTime>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Transactions CSV export to score
    pub(crate) transactions: PathBuf,
    /// Default-history CSV joined on bvn
    #[arg(long)]
    pub(crate) defaults: Option<PathBuf>,
    /// Evaluation time for the 90-day rule (defaults to now)
    #[arg(long, value_parser = parse_now)]
    pub(crate) now: Option<NaiveDateTime>,
}

pub(crate) fn run_once(args: RunOnceArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = Arc::new(LocalObjectStore::from_config(&config.storage));
    info!(root = %store.root().display(), "running a single cycle");
    let pipeline = ScoringPipeline::new(store, &config.pipeline);
    let report = pipeline.run_cycle(ObjectSelection::All, now_or_local(args.now))?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).map_err(io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}

pub(crate) fn score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let body = score_files(
        &config.pipeline,
        &args.transactions,
        args.defaults.as_deref(),
        now_or_local(args.now),
    )?;
    io::stdout().lock().write_all(&body)?;
    Ok(())
}

/// Loads local CSV files into an in-memory store and scores them through the
/// same collate, coerce, join and score stages as a cycle.
pub(crate) fn score_files(
    config: &PipelineConfig,
    transactions: &Path,
    defaults: Option<&Path>,
    now: NaiveDateTime,
) -> Result<Vec<u8>, AppError> {
    let store = MemoryObjectStore::new();
    load_file(&store, &config.transactions_collection, transactions)?;
    match defaults {
        Some(path) => load_file(&store, &config.defaults_collection, path)?,
        None => store
            .create_collection(&config.defaults_collection)
            .map_err(CycleError::from)?,
    }

    let pipeline = ScoringPipeline::new(Arc::new(store), config);
    let batch = pipeline.score(ObjectSelection::All, now)?;
    if batch.objects.is_empty() {
        return Err(AppError::Usage(format!(
            "{} is not a usable transactions export",
            transactions.display()
        )));
    }

    Ok(scored_to_csv(&batch.scored)?)
}

fn load_file(store: &MemoryObjectStore, collection: &str, path: &Path) -> Result<(), AppError> {
    let object_id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Usage(format!("{} does not name a file", path.display())))?;
    let body = std::fs::read(path)?;
    store
        .insert(collection, &object_id, body)
        .map_err(CycleError::from)?;
    Ok(())
}
