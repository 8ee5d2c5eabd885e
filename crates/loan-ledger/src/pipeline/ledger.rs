use std::collections::{HashMap, HashSet};

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, info};

use super::records::{LedgerRecord, ScoredRecord};

pub const COMPLETED_MESSAGE: &str = "Completed";

/// Ledger state after merging one cycle's outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Every ledger row, with matched rows finalised in place.
    pub ledger: Vec<LedgerRecord>,
    /// Only the rows finalised by this merge, in ledger order.
    pub delta: Vec<LedgerRecord>,
}

/// `now` truncated to the minute and rendered the way ledger timestamps are stored.
pub fn updated_stamp(now: NaiveDateTime) -> String {
    let floored = now
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(now);
    floored.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Renders an approval the way it is stored in the ledger, e.g. `1000.0`.
pub fn render_amount(amount: f64) -> String {
    format!("{amount:?}")
}

/// Picks one outcome per `(bvn, application_id)`. When the join produced
/// several, the smallest approval wins so a borrower is never over-approved.
fn outcomes_by_identity(outcomes: &[ScoredRecord]) -> HashMap<(&str, &str), &ScoredRecord> {
    let mut chosen: HashMap<(&str, &str), &ScoredRecord> = HashMap::new();
    for outcome in outcomes {
        chosen
            .entry((outcome.bvn(), outcome.application_id()))
            .and_modify(|current| {
                if outcome.amount_approved < current.amount_approved {
                    *current = outcome;
                }
            })
            .or_insert(outcome);
    }
    chosen
}

/// Merges scored outcomes into the unprocessed rows of the complete table.
///
/// Only rows with neither `amount_approved` nor `decline_reason` are eligible,
/// and they match on the exact `(bvn, application_id)` pair. An identity that
/// already has a decided row anywhere in the ledger is never decided again,
/// even when a stale pending copy of it survives in another object.
pub fn reconcile(
    mut ledger: Vec<LedgerRecord>,
    outcomes: &[ScoredRecord],
    now: NaiveDateTime,
) -> Reconciliation {
    if outcomes.is_empty() {
        info!("no outcome data provided; ledger left untouched");
        return Reconciliation {
            ledger,
            delta: Vec::new(),
        };
    }

    let chosen = outcomes_by_identity(outcomes);
    let decided: HashSet<(String, String)> = ledger
        .iter()
        .filter(|row| !row.is_unprocessed())
        .map(|row| (row.bvn.clone(), row.application_id.clone()))
        .collect();
    let stamp = updated_stamp(now);
    let mut delta = Vec::new();
    let mut stale = 0usize;

    for row in ledger.iter_mut().filter(|row| row.is_unprocessed()) {
        let Some(outcome) = chosen.get(&row.identity()).copied() else {
            continue;
        };
        if decided.contains(&(row.bvn.clone(), row.application_id.clone())) {
            stale += 1;
            continue;
        }

        row.amount_approved = Some(render_amount(outcome.amount_approved));
        row.decline_reason = Some(outcome.decline_reason.clone());
        row.updated_date = Some(stamp.clone());
        row.loan_message = Some(COMPLETED_MESSAGE.to_string());
        delta.push(row.clone());
    }

    debug!(
        outcomes = outcomes.len(),
        identities = chosen.len(),
        finalised = delta.len(),
        stale,
        "ledger reconciled"
    );

    Reconciliation { ledger, delta }
}
