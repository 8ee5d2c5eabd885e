use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::records::{DefaultHistoryRecord, EnrichedRecord, TransactionRecord, YesNo};

/// A default counts as recent when it is at most this many days old.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 90;

/// Derives `(default_in_last_90days, has_it_make_it_good)` for one joined row.
/// `history` is `None` when the borrower has no default-history entry.
pub fn default_flags(history: Option<&DefaultHistoryRecord>, now: NaiveDateTime) -> (YesNo, YesNo) {
    let balance = history
        .and_then(|entry| entry.outstanding_balance)
        .unwrap_or(0.0);
    let recent = history
        .and_then(|entry| entry.date_of_default)
        .map(|defaulted_at| (now - defaulted_at).num_days() <= DEFAULT_LOOKBACK_DAYS)
        .unwrap_or(false);

    let defaulted = balance != 0.0 && recent;
    let made_good = balance == 0.0 || !defaulted;
    (YesNo::from_bool(defaulted), YesNo::from_bool(made_good))
}

/// Left-joins transactions with default history on `bvn`.
///
/// Every transaction survives. A borrower with several history entries yields
/// one enriched row per entry, like any left join; the reconciler collapses
/// those back to one decision per application.
pub fn join_default_history(
    transactions: Vec<TransactionRecord>,
    history: &[DefaultHistoryRecord],
    now: NaiveDateTime,
) -> Vec<EnrichedRecord> {
    let mut by_bvn: HashMap<&str, Vec<&DefaultHistoryRecord>> = HashMap::new();
    for entry in history {
        by_bvn.entry(entry.bvn.as_str()).or_default().push(entry);
    }

    let mut enriched = Vec::with_capacity(transactions.len());
    for transaction in transactions {
        let matches = if transaction.bvn.is_empty() {
            None
        } else {
            by_bvn.get(transaction.bvn.as_str())
        };

        match matches {
            Some(entries) => {
                for &entry in entries {
                    let (default_in_last_90days, has_it_make_it_good) =
                        default_flags(Some(entry), now);
                    enriched.push(EnrichedRecord {
                        transaction: transaction.clone(),
                        default_in_last_90days,
                        has_it_make_it_good,
                    });
                }
            }
            None => {
                let (default_in_last_90days, has_it_make_it_good) = default_flags(None, now);
                enriched.push(EnrichedRecord {
                    transaction,
                    default_in_last_90days,
                    has_it_make_it_good,
                });
            }
        }
    }

    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::records::BehaviouralFeatures;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn transaction(bvn: &str, application_id: &str) -> TransactionRecord {
        TransactionRecord {
            bvn: bvn.to_string(),
            application_id: application_id.to_string(),
            amount_requested: 10_000.0,
            date_created: None,
            features: BehaviouralFeatures::default(),
            file_key: "inbox/batch.csv".to_string(),
        }
    }

    fn history(bvn: &str, days_ago: Option<i64>, balance: Option<f64>) -> DefaultHistoryRecord {
        DefaultHistoryRecord {
            bvn: bvn.to_string(),
            application_id: Some("H1".to_string()),
            date_of_default: days_ago.map(|days| now() - Duration::days(days)),
            outstanding_balance: balance,
        }
    }

    #[test]
    fn unmatched_borrowers_are_not_flagged() {
        let enriched = join_default_history(
            vec![transaction("B1", "A1"), transaction("", "A2")],
            &[history("B9", Some(3), Some(100.0)), history("", Some(3), Some(100.0))],
            now(),
        );
        assert_eq!(enriched.len(), 2);
        for record in enriched {
            assert_eq!(record.default_in_last_90days, YesNo::N);
            assert_eq!(record.has_it_make_it_good, YesNo::Y);
        }
    }

    #[test]
    fn recent_unpaid_default_flags_borrower() {
        let entry = history("B1", Some(10), Some(500.0));
        assert_eq!(default_flags(Some(&entry), now()), (YesNo::Y, YesNo::N));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let on_boundary = history("B1", Some(90), Some(500.0));
        assert_eq!(default_flags(Some(&on_boundary), now()).0, YesNo::Y);

        let past_boundary = history("B1", Some(91), Some(500.0));
        assert_eq!(default_flags(Some(&past_boundary), now()), (YesNo::N, YesNo::Y));
    }

    #[test]
    fn settled_or_undated_defaults_are_not_flagged() {
        let settled = history("B1", Some(5), Some(0.0));
        assert_eq!(default_flags(Some(&settled), now()), (YesNo::N, YesNo::Y));

        let missing_balance = history("B1", Some(5), None);
        assert_eq!(default_flags(Some(&missing_balance), now()), (YesNo::N, YesNo::Y));

        let undated = history("B1", None, Some(750.0));
        assert_eq!(default_flags(Some(&undated), now()), (YesNo::N, YesNo::Y));
    }

    #[test]
    fn multiple_history_entries_fan_out() {
        let enriched = join_default_history(
            vec![transaction("B1", "A1")],
            &[history("B1", Some(5), Some(10.0)), history("B1", Some(400), Some(10.0))],
            now(),
        );
        let flags = enriched
            .iter()
            .map(|record| record.default_in_last_90days)
            .collect::<Vec<_>>();
        assert_eq!(flags, vec![YesNo::Y, YesNo::N]);
    }
}
