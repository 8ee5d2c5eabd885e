use crate::commands::{run_once, score, RunOnceArgs, ScoreArgs};
use crate::watch;
use clap::{Args, Parser, Subcommand};
use loan_ledger::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "loan-ledger-watch",
    about = "Score loan-application batches and reconcile decisions into the complete table",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the transaction collection and run a cycle for new objects (default command)
    Watch(WatchArgs),
    /// Run one cycle over every object in the transaction collection
    RunOnce(RunOnceArgs),
    /// Score a local transactions CSV and print the scored rows
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct WatchArgs {
    /// Override the configured poll interval, in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) interval_secs: Option<u64>,
    /// Override the configured host for the health and metrics server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the health and metrics server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Watch(WatchArgs::default()));

    match command {
        Command::Watch(args) => watch::run(args).await,
        Command::RunOnce(args) => run_once(args),
        Command::Score(args) => score(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_is_the_default_command() {
        let cli = Cli::try_parse_from(["loan-ledger-watch"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn watch_overrides_are_parsed() {
        let cli = Cli::try_parse_from([
            "loan-ledger-watch",
            "watch",
            "--interval-secs",
            "30",
            "--port",
            "9100",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Watch(args)) => {
                assert_eq!(args.interval_secs, Some(30));
                assert_eq!(args.port, Some(9100));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["loan-ledger-watch", "watch", "--interval-secs", "0"]).is_err());
    }

    #[test]
    fn score_requires_a_transactions_file() {
        assert!(Cli::try_parse_from(["loan-ledger-watch", "score"]).is_err());
        let cli = Cli::try_parse_from([
            "loan-ledger-watch",
            "score",
            "transactions.csv",
            "--defaults",
            "history.csv",
            "--now",
            "2025-07-01T09:41:00",
        ])
        .expect("parses");
        assert!(matches!(cli.command, Some(Command::Score(_))));
    }
}
