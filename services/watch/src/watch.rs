use crate::cli::WatchArgs;
use crate::infra::AppState;
use crate::routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use loan_ledger::config::AppConfig;
use loan_ledger::error::AppError;
use loan_ledger::pipeline::{Orchestrator, ScoringPipeline};
use loan_ledger::storage::{LocalObjectStore, ObjectStore};
use loan_ledger::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub(crate) async fn run(mut args: WatchArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(secs) = args.interval_secs.take() {
        config.pipeline.poll_interval = Duration::from_secs(secs);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness.clone(),
        metrics: Arc::new(prometheus_handle),
    };
    let app = routes::router()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let store = Arc::new(LocalObjectStore::from_config(&config.storage));
    let mut orchestrator = Orchestrator::new(ScoringPipeline::new(store, &config.pipeline));

    readiness.store(true, Ordering::Release);
    info!(
        ?config.environment,
        %addr,
        collection = %config.pipeline.transactions_collection,
        interval_secs = config.pipeline.poll_interval.as_secs(),
        "watching for new loan batches"
    );

    let result = poll_loop(&mut orchestrator, config.pipeline.poll_interval).await;

    readiness.store(false, Ordering::Release);
    server.abort();
    result
}

/// Runs one tick per interval until shutdown or a fatal error. Ticks never
/// overlap; a slow cycle delays the next tick.
async fn poll_loop<S>(
    orchestrator: &mut Orchestrator<S>,
    interval: Duration,
) -> Result<(), AppError>
where
    S: ObjectStore + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                return Ok(());
            }
        }

        let now = Local::now().naive_local();
        match tokio::task::block_in_place(|| orchestrator.tick(now)) {
            Ok(Some(report)) => info!(
                outcome = report.outcome.label(),
                completed = report.ledger_rows_completed,
                "tick processed new objects"
            ),
            Ok(None) => {}
            Err(err) if err.is_fatal() => {
                error!(error = %err, "fatal pipeline error; stopping watch loop");
                return Err(err.into());
            }
            Err(err) => error!(error = %err, "cycle failed; objects will be retried"),
        }
    }
}
