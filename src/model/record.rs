//! Validation boundary between the untyped JSON rows returned by the store and the typed model.
//!
//! Every row is checked field by field. A row that does not match its schema produces a
//! `RecordError` naming the table, the field and what was wrong with it.

use crate::model::Amount;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A dated, categorized monetary value. Utility expenses and dividend income rows both become
/// `MonetaryRecord`s; the category is the expense type or the stock ticker.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MonetaryRecord {
    category: String,
    date: NaiveDate,
    amount: Amount,
}

impl MonetaryRecord {
    pub fn new(category: impl Into<String>, date: NaiveDate, amount: Amount) -> Self {
        Self {
            category: category.into(),
            date,
            amount,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Parses a `{category_name, create_date, amount}` row.
    pub fn from_row(table: &str, row: &Value) -> Result<Self, RecordError> {
        let r = RowReader::new(table, row)?;
        Ok(Self {
            category: r.string("category_name")?,
            date: r.date("create_date")?,
            amount: r.amount("amount")?,
        })
    }

    /// Parses every row, stopping at the first one that fails validation.
    pub fn from_rows(table: &str, rows: &[Value]) -> Result<Vec<Self>, RecordError> {
        rows.iter().map(|row| Self::from_row(table, row)).collect()
    }
}

/// What was wrong with a field.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordErrorKind {
    /// The row was not a JSON object.
    NotAnObject,
    /// The field is absent or `null`.
    MissingField,
    /// The field holds a value of the wrong JSON type.
    WrongType { expected: &'static str },
    /// The field could not be read as a `YYYY-MM-DD` date or timestamp.
    MalformedDate { value: String },
    /// The field could not be read as a decimal amount.
    MalformedAmount { value: String },
}

/// A row from the store failed validation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RecordError {
    table: String,
    field: Option<&'static str>,
    kind: RecordErrorKind,
}

impl RecordError {
    fn new(table: &str, field: &'static str, kind: RecordErrorKind) -> Self {
        Self {
            table: table.to_string(),
            field: Some(field),
            kind,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn field(&self) -> Option<&str> {
        self.field
    }

    pub fn kind(&self) -> &RecordErrorKind {
        &self.kind
    }
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let field = self.field.unwrap_or("");
        match &self.kind {
            RecordErrorKind::NotAnObject => {
                write!(f, "Malformed record in '{}': row is not an object", self.table)
            }
            RecordErrorKind::MissingField => write!(
                f,
                "Malformed record in '{}': missing field '{field}'",
                self.table
            ),
            RecordErrorKind::WrongType { expected } => write!(
                f,
                "Malformed record in '{}': field '{field}' should be {expected}",
                self.table
            ),
            RecordErrorKind::MalformedDate { value } => write!(
                f,
                "Malformed record in '{}': field '{field}' has invalid date '{value}'",
                self.table
            ),
            RecordErrorKind::MalformedAmount { value } => write!(
                f,
                "Malformed record in '{}': field '{field}' has invalid amount '{value}'",
                self.table
            ),
        }
    }
}

impl std::error::Error for RecordError {}

/// Typed field access over one JSON row.
pub(crate) struct RowReader<'a> {
    table: &'a str,
    row: &'a Map<String, Value>,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(table: &'a str, row: &'a Value) -> Result<Self, RecordError> {
        match row.as_object() {
            Some(row) => Ok(Self { table, row }),
            None => Err(RecordError {
                table: table.to_string(),
                field: None,
                kind: RecordErrorKind::NotAnObject,
            }),
        }
    }

    fn err(&self, field: &'static str, kind: RecordErrorKind) -> RecordError {
        RecordError::new(self.table, field, kind)
    }

    fn get(&self, field: &'static str) -> Option<&'a Value> {
        self.row.get(field).filter(|v| !v.is_null())
    }

    fn required(&self, field: &'static str) -> Result<&'a Value, RecordError> {
        self.get(field)
            .ok_or_else(|| self.err(field, RecordErrorKind::MissingField))
    }

    pub(crate) fn string(&self, field: &'static str) -> Result<String, RecordError> {
        match self.required(field)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(self.err(field, RecordErrorKind::WrongType { expected: "a string" })),
        }
    }

    pub(crate) fn opt_string(&self, field: &'static str) -> Result<Option<String>, RecordError> {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.string(field).map(Some),
        }
    }

    /// Ids are integers in some tables and uuid strings in others; both are returned as text.
    pub(crate) fn id(&self, field: &'static str) -> Result<String, RecordError> {
        match self.required(field)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            _ => Err(self.err(
                field,
                RecordErrorKind::WrongType {
                    expected: "an integer or string id",
                },
            )),
        }
    }

    pub(crate) fn i64(&self, field: &'static str) -> Result<i64, RecordError> {
        self.required(field)?.as_i64().ok_or_else(|| {
            self.err(
                field,
                RecordErrorKind::WrongType {
                    expected: "an integer",
                },
            )
        })
    }

    pub(crate) fn bool(&self, field: &'static str) -> Result<bool, RecordError> {
        self.required(field)?.as_bool().ok_or_else(|| {
            self.err(
                field,
                RecordErrorKind::WrongType {
                    expected: "a boolean",
                },
            )
        })
    }

    pub(crate) fn amount(&self, field: &'static str) -> Result<Amount, RecordError> {
        let v = self.required(field)?;
        Amount::from_json(v).ok_or_else(|| {
            self.err(
                field,
                RecordErrorKind::MalformedAmount {
                    value: display_value(v),
                },
            )
        })
    }

    pub(crate) fn date(&self, field: &'static str) -> Result<NaiveDate, RecordError> {
        let malformed = |value: String| self.err(field, RecordErrorKind::MalformedDate { value });
        let v = self
            .get(field)
            .ok_or_else(|| malformed("null".to_string()))?;
        let s = v.as_str().ok_or_else(|| malformed(display_value(v)))?;
        parse_date(s).ok_or_else(|| malformed(s.to_string()))
    }

    pub(crate) fn timestamp(&self, field: &'static str) -> Result<DateTime<Utc>, RecordError> {
        let malformed = |value: String| self.err(field, RecordErrorKind::MalformedDate { value });
        let v = self
            .get(field)
            .ok_or_else(|| malformed("null".to_string()))?;
        let s = v.as_str().ok_or_else(|| malformed(display_value(v)))?;
        parse_timestamp(s).ok_or_else(|| malformed(s.to_string()))
    }

    pub(crate) fn opt_timestamp(
        &self,
        field: &'static str,
    ) -> Result<Option<DateTime<Utc>>, RecordError> {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.timestamp(field).map(Some),
        }
    }
}

/// Parses a `YYYY-MM-DD` date, or the date part of a timestamp that begins with one. Only the
/// leading ten characters are used so a time-of-day or offset never shifts the month.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10)?;
    let rest = &s[10..];
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parses an RFC 3339 timestamp. Timestamps without an offset are taken to be UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_from_row() {
        let row = json!({"id": 4, "category_name": "Electric", "create_date": "2025-03-15", "amount": 100});
        let rec = MonetaryRecord::from_row("utility_expenses", &row).unwrap();
        assert_eq!(rec.category(), "Electric");
        assert_eq!(rec.date(), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(rec.amount(), Amount::from_str("100").unwrap());
    }

    #[test]
    fn test_from_row_amount_as_string() {
        let row = json!({"category_name": "VTI", "create_date": "2025-06-30", "amount": "12.34"});
        let rec = MonetaryRecord::from_row("dividend_income", &row).unwrap();
        assert_eq!(rec.amount(), Amount::from_str("12.34").unwrap());
    }

    #[test]
    fn test_timestamp_date_uses_calendar_prefix() {
        // Late on the last day of the month with a negative offset must stay in January.
        let row = json!({"category_name": "Gas", "create_date": "2025-01-31T23:30:00-08:00", "amount": 5});
        let rec = MonetaryRecord::from_row("utility_expenses", &row).unwrap();
        assert_eq!(rec.date().month(), 1);
    }

    #[test]
    fn test_null_date_is_malformed() {
        let row = json!({"category_name": "Gas", "create_date": null, "amount": 5});
        let e = MonetaryRecord::from_row("utility_expenses", &row).unwrap_err();
        assert_eq!(e.field(), Some("create_date"));
        assert!(matches!(e.kind(), RecordErrorKind::MalformedDate { .. }));
    }

    #[test]
    fn test_garbage_date_is_malformed() {
        for bad in ["2025-13-01", "2025/03/01", "March", "2025-03", "2025-03-01x"] {
            let row = json!({"category_name": "Gas", "create_date": bad, "amount": 5});
            let e = MonetaryRecord::from_row("utility_expenses", &row).unwrap_err();
            assert_eq!(
                e.kind(),
                &RecordErrorKind::MalformedDate {
                    value: bad.to_string()
                },
                "{bad}"
            );
        }
    }

    #[test]
    fn test_missing_category() {
        let row = json!({"create_date": "2025-03-01", "amount": 5});
        let e = MonetaryRecord::from_row("utility_expenses", &row).unwrap_err();
        assert_eq!(e.kind(), &RecordErrorKind::MissingField);
        assert_eq!(
            e.to_string(),
            "Malformed record in 'utility_expenses': missing field 'category_name'"
        );
    }

    #[test]
    fn test_wrong_type_category() {
        let row = json!({"category_name": 9, "create_date": "2025-03-01", "amount": 5});
        let e = MonetaryRecord::from_row("utility_expenses", &row).unwrap_err();
        assert!(matches!(e.kind(), RecordErrorKind::WrongType { .. }));
    }

    #[test]
    fn test_bad_amount() {
        let row = json!({"category_name": "Gas", "create_date": "2025-03-01", "amount": "lots"});
        let e = MonetaryRecord::from_row("utility_expenses", &row).unwrap_err();
        assert_eq!(
            e.kind(),
            &RecordErrorKind::MalformedAmount {
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn test_not_an_object() {
        let e = MonetaryRecord::from_row("utility_expenses", &json!([1, 2])).unwrap_err();
        assert_eq!(e.kind(), &RecordErrorKind::NotAnObject);
        assert_eq!(e.field(), None);
    }

    #[test]
    fn test_from_rows_stops_at_first_error() {
        let rows = vec![
            json!({"category_name": "Gas", "create_date": "2025-03-01", "amount": 5}),
            json!({"category_name": "Gas", "create_date": "bad", "amount": 5}),
        ];
        assert!(MonetaryRecord::from_rows("utility_expenses", &rows).is_err());
        assert_eq!(
            MonetaryRecord::from_rows("utility_expenses", &rows[..1])
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let a = parse_timestamp("2025-05-01T10:15:00Z").unwrap();
        let b = parse_timestamp("2025-05-01T10:15:00").unwrap();
        let c = parse_timestamp("2025-05-01 10:15:00.123").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.hour(), 10);
        let offset = parse_timestamp("2025-05-01T10:15:00+02:00").unwrap();
        assert_eq!(offset.hour(), 8);
        assert!(parse_timestamp("yesterday").is_none());
    }
}
