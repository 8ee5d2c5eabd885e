use crate::pipeline::records::BehaviouralFeatures;

/// Scored behavioural features. `utility_bills_in_90days` is carried on the
/// record but has no weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Airtime,
    BillPayment,
    CableTv,
    Deposit,
    EasyPayment,
    Farmer,
    InterBank,
    Mobile,
    Withdrawal,
}

impl Feature {
    pub fn column(&self) -> &'static str {
        match self {
            Feature::Airtime => "airtime_in_90days",
            Feature::BillPayment => "bill_payment_in_90days",
            Feature::CableTv => "cable_tv_in_90days",
            Feature::Deposit => "deposit_in_90days",
            Feature::EasyPayment => "easy_payment_in_90days",
            Feature::Farmer => "farmer_in_90days",
            Feature::InterBank => "inter_bank_in_90days",
            Feature::Mobile => "mobile_in_90days",
            Feature::Withdrawal => "withdrawal_in_90days",
        }
    }

    fn value(&self, features: &BehaviouralFeatures) -> f64 {
        match self {
            Feature::Airtime => features.airtime_in_90days,
            Feature::BillPayment => features.bill_payment_in_90days,
            Feature::CableTv => features.cable_tv_in_90days,
            Feature::Deposit => features.deposit_in_90days,
            Feature::EasyPayment => features.easy_payment_in_90days,
            Feature::Farmer => features.farmer_in_90days,
            Feature::InterBank => features.inter_bank_in_90days,
            Feature::Mobile => features.mobile_in_90days,
            Feature::Withdrawal => features.withdrawal_in_90days,
        }
    }
}

pub const FEATURE_WEIGHTS: [(Feature, f64); 9] = [
    (Feature::Airtime, 0.02),
    (Feature::BillPayment, 0.02),
    (Feature::CableTv, 0.02),
    (Feature::Deposit, 0.3),
    (Feature::EasyPayment, 0.02),
    (Feature::Farmer, 0.02),
    (Feature::InterBank, 0.02),
    (Feature::Mobile, 0.02),
    (Feature::Withdrawal, 0.5),
];

/// Weighted sum of the scored features.
pub fn estimate(features: &BehaviouralFeatures) -> f64 {
    FEATURE_WEIGHTS
        .iter()
        .map(|(feature, weight)| weight * feature.value(features))
        .sum()
}
