//! Columnar ledger table shared by both engines.
//!
//! RULE: Engines only ever see `&Dataset`. Nothing in this crate
//! mutates a dataset after construction; derived views borrow from it.
//!
//! Column names are trimmed on construction and must be unique.
//! Rows keep insertion order. Non-finite numbers are stored as Null.

use crate::{
    error::{LedgerError, LedgerResult},
    types::{PayeeId, RowIndex},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Cells ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric coercion. Text is trimmed and parsed; dates never coerce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Date coercion. Text is matched on its leading date part so that
    /// timestamps like "2024-03-01 00:00:00" still resolve.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// The stringified form used for identifier comparison.
    /// Integral numbers drop the fractional part, so 1001 and 1001.0 both
    /// render as "1001" and match the text cell "1001".
    pub fn display_key(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Convert one JSON cell. ISO-looking strings become dates.
    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Text(b.to_string()),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Null),
            serde_json::Value::String(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => Self::Date(d),
                Err(_) => Self::Text(s.clone()),
            },
            other => Self::Text(other.to_string()),
        }
    }
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.split(|c: char| c == ' ' || c == 'T').next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

// ── Columns ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Date,
    Text,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

fn infer_type<'a>(cells: impl Iterator<Item = &'a Value> + Clone) -> ColumnType {
    let mut non_null = cells.filter(|v| !v.is_null());
    if non_null.clone().all(|v| v.as_f64().is_some()) {
        // An all-null column lands here, like a float column of NaNs.
        ColumnType::Numeric
    } else if non_null.all(|v| v.as_date().is_some()) {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

// ── Dataset ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows:    Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct JsonTable {
    columns: Vec<String>,
    rows:    Vec<Vec<serde_json::Value>>,
}

impl Dataset {
    pub fn new(column_names: Vec<String>, rows: Vec<Vec<Value>>) -> LedgerResult<Self> {
        let names: Vec<String> = column_names.iter().map(|n| n.trim().to_string()).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(LedgerError::DuplicateColumn { column: name.clone() });
            }
        }

        let mut clean_rows: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(LedgerError::RaggedRow {
                    row: i,
                    expected: names.len(),
                    actual: row.len(),
                });
            }
            let row = row
                .into_iter()
                .map(|v| match v {
                    Value::Number(n) if !n.is_finite() => Value::Null,
                    other => other,
                })
                .collect();
            clean_rows.push(row);
        }

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column {
                name,
                kind: infer_type(clean_rows.iter().map(move |r| &r[idx])),
            })
            .collect();

        Ok(Self { columns, rows: clean_rows })
    }

    /// Parse `{"columns": [...], "rows": [[...], ...]}`.
    pub fn from_json_table(json: &str) -> LedgerResult<Self> {
        let table: JsonTable = serde_json::from_str(json)?;
        let rows = table
            .rows
            .iter()
            .map(|r| r.iter().map(Value::from_json).collect())
            .collect();
        Self::new(table.columns, rows)
    }

    /// Parse an array of JSON objects. Columns appear in first-seen order;
    /// keys missing from a record become Null.
    pub fn from_json_records(json: &str) -> LedgerResult<Self> {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(json)?;
        let mut names: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                names
                    .iter()
                    .map(|n| record.get(n).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::new(names, rows)
    }

    /// Accept either JSON shape: an object with columns/rows, or a records array.
    pub fn from_json(json: &str) -> LedgerResult<Self> {
        if json.trim_start().starts_with('[') {
            Self::from_json_records(json)
        } else {
            Self::from_json_table(json)
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|i| self.columns[i].kind)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: RowIndex) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row { dataset: self, index, cells })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows
            .iter()
            .enumerate()
            .map(move |(index, cells)| Row { dataset: self, index, cells })
    }

    /// All cells of one column, in row order.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Value> + Clone {
        self.rows.iter().map(move |r| &r[column])
    }

    /// Rows whose `id_column` cell stringifies to `payee_id`.
    pub fn payee_record(&self, id_column: &str, payee_id: &str) -> LedgerResult<PayeeRecord<'_>> {
        let col = self
            .column_index(id_column)
            .ok_or_else(|| LedgerError::MissingColumn { column: id_column.to_string() })?;
        let key = payee_id.trim();
        let rows = self
            .rows()
            .filter(|row| !row.cells[col].is_null() && row.cells[col].display_key() == key)
            .collect();
        Ok(PayeeRecord { payee_id: key.to_string(), rows })
    }
}

// ── Borrowed views ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    dataset:   &'a Dataset,
    pub index: RowIndex,
    cells:     &'a [Value],
}

impl<'a> Row<'a> {
    /// Cell by column name. None if the column does not exist.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.dataset.column_index(column).map(|i| &self.cells[i])
    }

    pub fn cells(&self) -> &'a [Value] {
        self.cells
    }
}

/// The subset of rows recorded for one payee.
#[derive(Debug, Clone)]
pub struct PayeeRecord<'a> {
    pub payee_id: PayeeId,
    pub rows:     Vec<Row<'a>>,
}

impl<'a> PayeeRecord<'a> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lookups take the first matching row.
    pub fn first(&self) -> Option<&Row<'a>> {
        self.rows.first()
    }

    /// The first row's non-null cell in `column`, if any.
    pub fn recorded(&self, column: &str) -> Option<&'a Value> {
        self.first()
            .and_then(|row| row.get(column))
            .filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn column_names_are_trimmed_and_unique() {
        let ds = Dataset::new(names(&[" Payee ID ", "Total Incentive"]), vec![]).unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["Payee ID", "Total Incentive"]);

        let err = Dataset::new(names(&["a", " a"]), vec![]).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateColumn { .. }));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Dataset::new(names(&["a", "b"]), vec![vec![1.0.into()]]).unwrap_err();
        assert!(matches!(err, LedgerError::RaggedRow { row: 0, expected: 2, actual: 1 }));
    }

    #[test]
    fn infers_column_types() {
        let ds = Dataset::new(
            names(&["n", "s", "d", "t", "empty"]),
            vec![
                vec![1.0.into(), "2.5".into(), "2024-01-31".into(), "abc".into(), Value::Null],
                vec![Value::Null, "3".into(), Value::Null, "4".into(), Value::Null],
            ],
        )
        .unwrap();
        assert_eq!(ds.column_type("n"), Some(ColumnType::Numeric));
        assert_eq!(ds.column_type("s"), Some(ColumnType::Numeric));
        assert_eq!(ds.column_type("d"), Some(ColumnType::Date));
        assert_eq!(ds.column_type("t"), Some(ColumnType::Text));
        assert_eq!(ds.column_type("empty"), Some(ColumnType::Numeric));
    }

    #[test]
    fn display_key_tolerates_mixed_encodings() {
        assert_eq!(Value::Number(1001.0).display_key(), "1001");
        assert_eq!(Value::Number(10.5).display_key(), "10.5");
        assert_eq!(Value::text("P-7").display_key(), "P-7");
    }

    #[test]
    fn payee_record_matches_on_stringified_id() {
        let ds = Dataset::new(
            names(&["Payee ID", "Total Incentive"]),
            vec![
                vec![1001.0.into(), 500.0.into()],
                vec!["1001".into(), 900.0.into()],
                vec!["1002".into(), 100.0.into()],
            ],
        )
        .unwrap();
        let rec = ds.payee_record("Payee ID", "1001").unwrap();
        assert_eq!(rec.rows.len(), 2);
        assert_eq!(rec.recorded("Total Incentive").and_then(Value::as_f64), Some(500.0));
    }

    #[test]
    fn parses_dates_with_time_suffix() {
        let d = Value::text("2024-03-01 00:00:00").as_date().unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn records_keep_first_seen_column_order() {
        let ds = Dataset::from_json_records(
            r#"[{"id": 1, "amount": 10.0}, {"id": 2, "notes": "x", "amount": 12.0}]"#,
        )
        .unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["id", "amount", "notes"]);
        assert!(ds.row(0).unwrap().get("notes").unwrap().is_null());
    }
}
