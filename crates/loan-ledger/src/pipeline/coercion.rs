use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::warn;

use super::table::{Table, Value};

/// Target type of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Float,
    Date,
}

/// What a coercion pass changed, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    pub missing_columns: Vec<String>,
    pub nulled_values: usize,
}

/// Coerces every declared column present in `table`. Absent columns are
/// reported and skipped; unparseable cells become `Null`.
pub fn coerce_columns(table: &mut Table, schema: &[(&str, ColumnType)]) -> CoercionReport {
    let mut report = CoercionReport::default();

    for &(column, column_type) in schema {
        let Some(index) = table.column_index(column) else {
            warn!(column, "column does not exist in batch; skipping coercion");
            report.missing_columns.push(column.to_string());
            continue;
        };

        for cell in table.column_mut(index) {
            let was_null = cell.is_null();
            let coerced = coerce_value(std::mem::replace(cell, Value::Null), column_type);
            if !was_null && coerced.is_null() {
                report.nulled_values += 1;
            }
            *cell = coerced;
        }
    }

    if report.nulled_values > 0 {
        warn!(
            nulled = report.nulled_values,
            "unparseable values coerced to null"
        );
    }

    report
}

fn coerce_value(value: Value, column_type: ColumnType) -> Value {
    match (column_type, value) {
        (_, Value::Null) => Value::Null,
        (ColumnType::String, Value::Text(text)) => Value::Text(text),
        (ColumnType::String, other) => other.to_text().map(Value::Text).unwrap_or(Value::Null),
        (ColumnType::Float, Value::Float(number)) => finite(number),
        (ColumnType::Float, Value::Text(text)) => text
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .map(finite)
            .unwrap_or(Value::Null),
        (ColumnType::Float, Value::Date(_)) => Value::Null,
        (ColumnType::Date, Value::Date(date)) => Value::Date(date),
        (ColumnType::Date, Value::Text(text)) => parse_datetime(&text)
            .map(|datetime| Value::Date(datetime.date()))
            .unwrap_or(Value::Null),
        (ColumnType::Date, Value::Float(_)) => Value::Null,
    }
}

fn finite(number: f64) -> Value {
    if number.is_finite() {
        Value::Float(number)
    } else {
        Value::Null
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses the timestamp and date layouts seen in exported batches.
pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
