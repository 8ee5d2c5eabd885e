use crate::pipeline::records::YesNo;

/// Flat amount added to every estimate before rounding.
const BASE_AMOUNT: f64 = 25.0;
const ROUNDING_STEP: f64 = 1000.0;

/// Rounds to the nearest multiple of 1000, ties to even.
pub fn round_to_nearest_1000(amount: f64) -> f64 {
    // adding 0.0 folds -0.0 into 0.0
    (amount / ROUNDING_STEP).round_ties_even() * ROUNDING_STEP + 0.0
}

/// Adjudication for one application, before rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Approve `BASE_AMOUNT + multiplier * estimate`.
    Approve { multiplier: f64 },
    /// Recent unpaid default.
    Decline,
}

pub fn decide(default_in_last_90days: YesNo, has_it_make_it_good: YesNo) -> Decision {
    match (default_in_last_90days, has_it_make_it_good) {
        (YesNo::N, _) => Decision::Approve { multiplier: 1.0 },
        (YesNo::Y, YesNo::Y) => Decision::Approve { multiplier: 0.5 },
        (YesNo::Y, YesNo::N) => Decision::Decline,
    }
}

pub fn approved_amount(decision: Decision, estimate: f64) -> f64 {
    match decision {
        Decision::Approve { multiplier } => round_to_nearest_1000(BASE_AMOUNT + multiplier * estimate),
        Decision::Decline => 0.0,
    }
}

/// Reason recorded against a zero approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    Defaults,
    LowTransaction,
}

impl DeclineReason {
    pub fn message(&self) -> &'static str {
        match self {
            DeclineReason::Defaults => "Loan declined due to defaults",
            DeclineReason::LowTransaction => {
                "Loan declined due to low transaction or incomplete records"
            }
        }
    }
}

pub fn decline_reason(
    amount_approved: f64,
    default_in_last_90days: YesNo,
    has_it_make_it_good: YesNo,
) -> Option<DeclineReason> {
    if amount_approved != 0.0 {
        return None;
    }
    if default_in_last_90days == YesNo::Y && has_it_make_it_good == YesNo::N {
        Some(DeclineReason::Defaults)
    } else {
        Some(DeclineReason::LowTransaction)
    }
}
