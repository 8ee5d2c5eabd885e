use std::io::Read;

use chrono::NaiveDate;

/// One cell of a batch. Cells start out as `Text` (or `Null` when empty) and
/// are narrowed by [`super::coercion::coerce_columns`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Text form of any non-null cell.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(text.clone()),
            Value::Float(value) => Some(value.to_string()),
            Value::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
        }
    }
}

static NULL: Value = Value::Null;

/// In-memory tabular batch with named columns, as read from one or more CSV objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Parses headed CSV; surrounding whitespace is trimmed and empty fields become `Null`.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = csv_reader
            .headers()?
            .iter()
            .map(|header| header.replace(['\u{feff}', '\u{200b}'], ""))
            .collect::<Vec<_>>();
        let mut table = Table::new(columns);

        for record in csv_reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(field.to_string())
                    }
                })
                .collect();
            table.rows.push(row);
        }

        Ok(table)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|value| value.to_text().unwrap_or_default()))?;
        }
        writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row; short rows are padded with `Null`, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Sets `name` to `value` on every row, adding the column when absent.
    pub fn fill_column(&mut self, name: &str, value: Value) {
        match self.column_index(name) {
            Some(index) => {
                for row in &mut self.rows {
                    row[index] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> impl Iterator<Item = &mut Value> {
        self.rows.iter_mut().map(move |row| &mut row[index])
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Row<'_>) -> bool,
    {
        let columns = &self.columns;
        self.rows.retain(|values| keep(Row { columns, values }));
    }

    /// Stacks tables; the column set is the union in first-seen order and
    /// cells a table lacks become `Null`.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut merged = Table::new(columns);
        for table in tables {
            let mapping = merged
                .columns
                .iter()
                .map(|column| table.column_index(column))
                .collect::<Vec<_>>();
            for mut row in table.rows {
                let values = mapping
                    .iter()
                    .map(|index| match index {
                        Some(index) => std::mem::replace(&mut row[*index], Value::Null),
                        None => Value::Null,
                    })
                    .collect();
                merged.rows.push(values);
            }
        }
        merged
    }
}

/// Borrowed view of one row with lookup by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// The cell under `column`, or `Null` when the column is absent.
    pub fn get(&self, column: &str) -> &'a Value {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
            .unwrap_or(&NULL)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).to_text()
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        self.get(column).as_float()
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).as_date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn from_csv_trims_and_nulls_empty_fields() {
        let table = Table::from_csv(Cursor::new(
            "\u{feff}bvn, application_id ,amount_requested\n B1 ,,5000\n",
        ))
        .expect("parse");

        assert_eq!(table.columns(), ["bvn", "application_id", "amount_requested"]);
        let row = table.rows().next().expect("row");
        assert_eq!(row.get("bvn"), &Value::Text("B1".to_string()));
        assert!(row.get("application_id").is_null());
        assert!(row.get("not_a_column").is_null());
    }

    #[test]
    fn from_csv_rejects_ragged_rows() {
        let result = Table::from_csv(Cursor::new("a,b\n1,2,3\n"));
        assert!(result.is_err());
    }

    #[test]
    fn concat_unions_columns_in_first_seen_order() {
        let mut left = Table::new(vec!["bvn".to_string(), "a".to_string()]);
        left.push_row(vec![Value::Text("B1".to_string()), Value::Float(1.0)]);
        let mut right = Table::new(vec!["b".to_string(), "bvn".to_string()]);
        right.push_row(vec![Value::Float(2.0), Value::Text("B2".to_string())]);

        let merged = Table::concat(vec![left, right]);
        assert_eq!(merged.columns(), ["bvn", "a", "b"]);
        let rows = merged.rows().collect::<Vec<_>>();
        assert_eq!(rows[0].float("a"), Some(1.0));
        assert!(rows[0].get("b").is_null());
        assert_eq!(rows[1].text("bvn").as_deref(), Some("B2"));
        assert!(rows[1].get("a").is_null());
    }

    #[test]
    fn fill_column_overwrites_existing_values() {
        let mut table = Table::from_csv(Cursor::new("bvn,file_key\nB1,stale\n")).expect("parse");
        table.fill_column("file_key", Value::Text("inbox/batch-1.csv".to_string()));
        table.fill_column("source", Value::Null);
        assert_eq!(table.columns(), ["bvn", "file_key", "source"]);
        let row = table.rows().next().expect("row");
        assert_eq!(row.text("file_key").as_deref(), Some("inbox/batch-1.csv"));
    }

    #[test]
    fn to_csv_writes_nulls_as_empty_fields() {
        let mut table = Table::new(vec!["bvn".to_string(), "amount".to_string()]);
        table.push_row(vec![Value::Text("B1".to_string())]);
        let rendered = String::from_utf8(table.to_csv().expect("write")).expect("utf8");
        assert_eq!(rendered, "bvn,amount\nB1,\n");
    }
}
