mod policy;
mod weights;

pub use policy::{
    approved_amount, decide, decline_reason, round_to_nearest_1000, Decision, DeclineReason,
};
pub use weights::{estimate, Feature, FEATURE_WEIGHTS};

use chrono::NaiveDate;
use serde::Serialize;

use super::records::{EnrichedRecord, ScoredRecord, YesNo};

/// Raised instead of guessing when a record cannot be scored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("estimate for application '{application_id}' is not a finite number")]
    NonFiniteEstimate { application_id: String },
    #[error("estimate {estimate} for application '{application_id}' is negative")]
    NegativeEstimate { application_id: String, estimate: f64 },
}

/// Stateless scorer applying the weight table and decision table to each record.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, record: EnrichedRecord) -> Result<ScoredRecord, ScoringError> {
        let estimate = weights::estimate(&record.transaction.features);
        if !estimate.is_finite() {
            return Err(ScoringError::NonFiniteEstimate {
                application_id: record.transaction.application_id.clone(),
            });
        }
        if estimate < 0.0 {
            return Err(ScoringError::NegativeEstimate {
                application_id: record.transaction.application_id.clone(),
                estimate,
            });
        }

        let decision = decide(record.default_in_last_90days, record.has_it_make_it_good);
        let amount_approved = approved_amount(decision, estimate);
        let decline_reason = decline_reason(
            amount_approved,
            record.default_in_last_90days,
            record.has_it_make_it_good,
        )
        .map(|reason| reason.message().to_string())
        .unwrap_or_default();

        Ok(ScoredRecord {
            enriched: record,
            amount_approved,
            decline_reason,
        })
    }

    /// Scores every record, returning failures alongside the successes.
    pub fn score_all(
        &self,
        records: Vec<EnrichedRecord>,
    ) -> (Vec<ScoredRecord>, Vec<ScoringError>) {
        let mut scored = Vec::with_capacity(records.len());
        let mut failures = Vec::new();
        for record in records {
            match self.score(record) {
                Ok(outcome) => scored.push(outcome),
                Err(err) => failures.push(err),
            }
        }
        (scored, failures)
    }
}

#[derive(Debug, Serialize)]
struct ScoredRow<'a> {
    bvn: &'a str,
    application_id: &'a str,
    amount_requested: f64,
    date_created: Option<NaiveDate>,
    airtime_in_90days: f64,
    bill_payment_in_90days: f64,
    cable_tv_in_90days: f64,
    deposit_in_90days: f64,
    easy_payment_in_90days: f64,
    farmer_in_90days: f64,
    inter_bank_in_90days: f64,
    mobile_in_90days: f64,
    utility_bills_in_90days: f64,
    withdrawal_in_90days: f64,
    file_key: &'a str,
    default_in_last_90days: YesNo,
    has_it_make_it_good: YesNo,
    amount_approved: f64,
    decline_reason: &'a str,
}

impl<'a> From<&'a ScoredRecord> for ScoredRow<'a> {
    fn from(record: &'a ScoredRecord) -> Self {
        let transaction = &record.enriched.transaction;
        let features = &transaction.features;
        Self {
            bvn: &transaction.bvn,
            application_id: &transaction.application_id,
            amount_requested: transaction.amount_requested,
            date_created: transaction.date_created,
            airtime_in_90days: features.airtime_in_90days,
            bill_payment_in_90days: features.bill_payment_in_90days,
            cable_tv_in_90days: features.cable_tv_in_90days,
            deposit_in_90days: features.deposit_in_90days,
            easy_payment_in_90days: features.easy_payment_in_90days,
            farmer_in_90days: features.farmer_in_90days,
            inter_bank_in_90days: features.inter_bank_in_90days,
            mobile_in_90days: features.mobile_in_90days,
            utility_bills_in_90days: features.utility_bills_in_90days,
            withdrawal_in_90days: features.withdrawal_in_90days,
            file_key: &transaction.file_key,
            default_in_last_90days: record.enriched.default_in_last_90days,
            has_it_make_it_good: record.enriched.has_it_make_it_good,
            amount_approved: record.amount_approved,
            decline_reason: &record.decline_reason,
        }
    }
}

/// Renders scored records as one flat CSV table.
pub fn scored_to_csv(records: &[ScoredRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(ScoredRow::from(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::records::{BehaviouralFeatures, TransactionRecord};

    fn enriched(features: BehaviouralFeatures, default: YesNo, made_good: YesNo) -> EnrichedRecord {
        EnrichedRecord {
            transaction: TransactionRecord {
                bvn: "B1".to_string(),
                application_id: "A1".to_string(),
                amount_requested: 50_000.0,
                date_created: NaiveDate::from_ymd_opt(2025, 6, 1),
                features,
                file_key: "inbox/batch.csv".to_string(),
            },
            default_in_last_90days: default,
            has_it_make_it_good: made_good,
        }
    }

    fn withdrawals(amount: f64) -> BehaviouralFeatures {
        BehaviouralFeatures {
            withdrawal_in_90days: amount,
            ..BehaviouralFeatures::default()
        }
    }

    #[test]
    fn clean_borrower_is_approved_on_full_estimate() {
        let scored = ScoringEngine::new()
            .score(enriched(withdrawals(1000.0), YesNo::N, YesNo::Y))
            .expect("scored");
        assert_eq!(scored.amount_approved, 1000.0);
        assert_eq!(scored.decline_reason, "");
    }

    #[test]
    fn recent_default_is_declined() {
        let scored = ScoringEngine::new()
            .score(enriched(withdrawals(1000.0), YesNo::Y, YesNo::N))
            .expect("scored");
        assert_eq!(scored.amount_approved, 0.0);
        assert_eq!(scored.decline_reason, "Loan declined due to defaults");
    }

    #[test]
    fn thin_history_is_declined_for_low_transactions() {
        let scored = ScoringEngine::new()
            .score(enriched(withdrawals(900.0), YesNo::N, YesNo::Y))
            .expect("scored");
        assert_eq!(scored.amount_approved, 0.0);
        assert_eq!(
            scored.decline_reason,
            "Loan declined due to low transaction or incomplete records"
        );
    }

    #[test]
    fn zero_amount_iff_decline_reason() {
        let engine = ScoringEngine::new();
        for amount in [0.0, 10.0, 950.0, 951.0, 2_000.0, 123_456.0] {
            for (default, made_good) in [
                (YesNo::N, YesNo::Y),
                (YesNo::Y, YesNo::Y),
                (YesNo::Y, YesNo::N),
            ] {
                let scored = engine
                    .score(enriched(withdrawals(amount), default, made_good))
                    .expect("scored");
                assert_eq!(
                    scored.amount_approved == 0.0,
                    !scored.decline_reason.is_empty(),
                    "amount {amount} flags {default}/{made_good}"
                );
            }
        }
    }

    #[test]
    fn non_finite_features_are_reported() {
        let features = BehaviouralFeatures {
            withdrawal_in_90days: f64::NAN,
            ..BehaviouralFeatures::default()
        };
        let (scored, failures) =
            ScoringEngine::new().score_all(vec![enriched(features, YesNo::N, YesNo::Y)]);
        assert!(scored.is_empty());
        assert_eq!(
            failures,
            vec![ScoringError::NonFiniteEstimate {
                application_id: "A1".to_string()
            }]
        );
    }

    #[test]
    fn negative_estimate_is_rejected_instead_of_approved() {
        let (scored, failures) = ScoringEngine::new()
            .score_all(vec![enriched(withdrawals(-6000.0), YesNo::N, YesNo::Y)]);
        assert!(scored.is_empty());
        assert_eq!(
            failures,
            vec![ScoringError::NegativeEstimate {
                application_id: "A1".to_string(),
                estimate: -3000.0,
            }]
        );
    }

    #[test]
    fn scored_csv_has_flat_header() {
        let scored = ScoringEngine::new()
            .score(enriched(withdrawals(1000.0), YesNo::N, YesNo::Y))
            .expect("scored");
        let rendered = String::from_utf8(scored_to_csv(&[scored]).expect("csv")).expect("utf8");
        let header = rendered.lines().next().expect("header");
        assert!(header.starts_with("bvn,application_id,amount_requested,date_created,"));
        assert!(header.ends_with("default_in_last_90days,has_it_make_it_good,amount_approved,decline_reason"));
    }
}
