mod cli;
mod commands;
mod infra;
mod routes;
mod watch;

use loan_ledger::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
