//! Typed records exchanged between pipeline stages, and the column schemas
//! used to validate and coerce each kind of batch.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::coercion::{parse_datetime, ColumnType};
use super::table::{Row, Table};

pub const FILE_KEY: &str = "file_key";

/// Declared types for an incoming transaction batch.
pub const TRANSACTION_SCHEMA: [(&str, ColumnType); 14] = [
    ("bvn", ColumnType::String),
    ("application_id", ColumnType::String),
    ("amount_requested", ColumnType::Float),
    ("date_created", ColumnType::Date),
    ("airtime_in_90days", ColumnType::Float),
    ("bill_payment_in_90days", ColumnType::Float),
    ("cable_tv_in_90days", ColumnType::Float),
    ("deposit_in_90days", ColumnType::Float),
    ("easy_payment_in_90days", ColumnType::Float),
    ("farmer_in_90days", ColumnType::Float),
    ("inter_bank_in_90days", ColumnType::Float),
    ("mobile_in_90days", ColumnType::Float),
    ("utility_bills_in_90days", ColumnType::Float),
    ("withdrawal_in_90days", ColumnType::Float),
];

pub const TRANSACTION_REQUIRED: [&str; 14] = [
    "bvn",
    "application_id",
    "amount_requested",
    "date_created",
    "airtime_in_90days",
    "bill_payment_in_90days",
    "cable_tv_in_90days",
    "deposit_in_90days",
    "easy_payment_in_90days",
    "farmer_in_90days",
    "inter_bank_in_90days",
    "mobile_in_90days",
    "utility_bills_in_90days",
    "withdrawal_in_90days",
];

/// `date_of_default` is left as text so the joiner keeps its time of day.
pub const DEFAULT_HISTORY_SCHEMA: [(&str, ColumnType); 2] = [
    ("bvn", ColumnType::String),
    ("outstanding_balance", ColumnType::Float),
];

pub const DEFAULT_HISTORY_REQUIRED: [&str; 3] = ["bvn", "date_of_default", "outstanding_balance"];

const HISTORY_APPLICATION_ID_COLUMNS: [&str; 2] = ["application_id", "applicationID"];

pub const LEDGER_SCHEMA: [(&str, ColumnType); 4] = [
    ("bvn", ColumnType::String),
    ("application_id", ColumnType::String),
    ("amount_approved", ColumnType::String),
    ("decline_reason", ColumnType::String),
];

pub const LEDGER_REQUIRED: [&str; 12] = [
    "bvn",
    "dob",
    "amount_requested",
    "application_id",
    "loan_tenure",
    "loan_repayment_structure",
    "internal_id",
    "amount_approved",
    "created_date",
    "updated_date",
    "decline_reason",
    "loan_message",
];

/// Normalises an identity value so `"1024"` and `"1024.0"` refer to the same key.
pub fn canonical_identity(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((whole, fraction)) = trimmed.split_once('.') {
        let numeric_whole = !whole.is_empty() && whole.bytes().all(|b| b.is_ascii_digit());
        let zero_fraction = !fraction.is_empty() && fraction.bytes().all(|b| b == b'0');
        if numeric_whole && zero_fraction {
            return whole.to_string();
        }
    }
    trimmed.to_string()
}

fn identity(row: &Row<'_>, column: &str) -> Option<String> {
    row.text(column)
        .map(|value| canonical_identity(&value))
        .filter(|value| !value.is_empty())
}

/// Behavioural features observed over the trailing 90 days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviouralFeatures {
    pub airtime_in_90days: f64,
    pub bill_payment_in_90days: f64,
    pub cable_tv_in_90days: f64,
    pub deposit_in_90days: f64,
    pub easy_payment_in_90days: f64,
    pub farmer_in_90days: f64,
    pub inter_bank_in_90days: f64,
    pub mobile_in_90days: f64,
    pub utility_bills_in_90days: f64,
    pub withdrawal_in_90days: f64,
}

/// One loan application snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub bvn: String,
    pub application_id: String,
    pub amount_requested: f64,
    pub date_created: Option<NaiveDate>,
    pub features: BehaviouralFeatures,
    pub file_key: String,
}

impl TransactionRecord {
    /// Builds a record from a coerced row. Rows without an `application_id` yield `None`;
    /// absent numeric values default to 0.0.
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        let application_id = identity(row, "application_id")?;
        let number = |column: &str| row.float(column).unwrap_or(0.0);

        Some(Self {
            bvn: identity(row, "bvn").unwrap_or_default(),
            application_id,
            amount_requested: number("amount_requested"),
            date_created: row.date("date_created"),
            features: BehaviouralFeatures {
                airtime_in_90days: number("airtime_in_90days"),
                bill_payment_in_90days: number("bill_payment_in_90days"),
                cable_tv_in_90days: number("cable_tv_in_90days"),
                deposit_in_90days: number("deposit_in_90days"),
                easy_payment_in_90days: number("easy_payment_in_90days"),
                farmer_in_90days: number("farmer_in_90days"),
                inter_bank_in_90days: number("inter_bank_in_90days"),
                mobile_in_90days: number("mobile_in_90days"),
                utility_bills_in_90days: number("utility_bills_in_90days"),
                withdrawal_in_90days: number("withdrawal_in_90days"),
            },
            file_key: row.text(FILE_KEY).unwrap_or_default(),
        })
    }

    pub fn from_table(table: &Table) -> Vec<Self> {
        table.rows().filter_map(|row| Self::from_row(&row)).collect()
    }
}

/// One default-history entry for a borrower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultHistoryRecord {
    pub bvn: String,
    pub application_id: Option<String>,
    pub date_of_default: Option<NaiveDateTime>,
    pub outstanding_balance: Option<f64>,
}

impl DefaultHistoryRecord {
    /// Rows without a `bvn` can never join and yield `None`.
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        let bvn = identity(row, "bvn")?;
        let application_id = HISTORY_APPLICATION_ID_COLUMNS
            .iter()
            .find_map(|column| identity(row, column));

        Some(Self {
            bvn,
            application_id,
            date_of_default: row
                .text("date_of_default")
                .as_deref()
                .and_then(parse_datetime),
            outstanding_balance: row.float("outstanding_balance"),
        })
    }

    pub fn from_table(table: &Table) -> Vec<Self> {
        table.rows().filter_map(|row| Self::from_row(&row)).collect()
    }
}

/// Two-valued flag as written in the batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YesNo {
    Y,
    N,
}

impl YesNo {
    pub fn from_bool(value: bool) -> Self {
        if value {
            YesNo::Y
        } else {
            YesNo::N
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Y => "Y",
            YesNo::N => "N",
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction joined with the borrower's default signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub transaction: TransactionRecord,
    pub default_in_last_90days: YesNo,
    pub has_it_make_it_good: YesNo,
}

/// Enriched record with the lending decision attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub enriched: EnrichedRecord,
    pub amount_approved: f64,
    pub decline_reason: String,
}

impl ScoredRecord {
    pub fn bvn(&self) -> &str {
        &self.enriched.transaction.bvn
    }

    pub fn application_id(&self) -> &str {
        &self.enriched.transaction.application_id
    }
}

/// One row of the complete table. Field order is the canonical column order
/// used whenever ledger rows are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub bvn: String,
    pub dob: Option<String>,
    pub amount_requested: Option<String>,
    pub application_id: String,
    pub loan_tenure: Option<String>,
    pub loan_repayment_structure: Option<String>,
    pub internal_id: Option<String>,
    /// Raw cell text; any value, numeric or not, marks the row as decided.
    pub amount_approved: Option<String>,
    pub created_date: Option<String>,
    pub updated_date: Option<String>,
    pub decline_reason: Option<String>,
    pub loan_message: Option<String>,
    pub file_key: String,
}

impl LedgerRecord {
    /// Rows lacking either identity column cannot be matched and yield `None`.
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            bvn: identity(row, "bvn")?,
            dob: row.text("dob"),
            amount_requested: row.text("amount_requested"),
            application_id: identity(row, "application_id")?,
            loan_tenure: row.text("loan_tenure"),
            loan_repayment_structure: row.text("loan_repayment_structure"),
            internal_id: row.text("internal_id"),
            amount_approved: row.text("amount_approved"),
            created_date: row.text("created_date"),
            updated_date: row.text("updated_date"),
            decline_reason: row.text("decline_reason"),
            loan_message: row.text("loan_message"),
            file_key: row.text(FILE_KEY).unwrap_or_default(),
        })
    }

    pub fn from_table(table: &Table) -> Vec<Self> {
        table.rows().filter_map(|row| Self::from_row(&row)).collect()
    }

    /// True until a decision has been recorded; only such rows may be updated.
    pub fn is_unprocessed(&self) -> bool {
        self.amount_approved.is_none() && self.decline_reason.is_none()
    }

    pub fn identity(&self) -> (&str, &str) {
        (&self.bvn, &self.application_id)
    }
}
