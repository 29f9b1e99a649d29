//! SQL value types for source-to-target data transfer.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Type hint for NULL values.
///
/// The COPY text format does not need a typed NULL, but carrying the hint
/// keeps decode errors distinguishable from genuine NULLs in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Decimal,
    Date,
    Time,
    DateTime,
}

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlNullType),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Render the value in PostgreSQL COPY text format.
    ///
    /// Escapes backslash, tab, newline and carriage return in strings;
    /// binary data becomes a hex bytea literal.
    pub fn to_copy_text(&self) -> String {
        match self {
            SqlValue::Null(_) => "\\N".to_string(),
            SqlValue::Bool(b) => if *b { "t" } else { "f" }.to_string(),
            SqlValue::I16(n) => n.to_string(),
            SqlValue::I32(n) => n.to_string(),
            SqlValue::I64(n) => n.to_string(),
            SqlValue::F32(n) => n.to_string(),
            SqlValue::F64(n) => n.to_string(),
            SqlValue::String(s) => escape_copy_text(s),
            SqlValue::Bytes(b) => format!("\\\\x{}", hex::encode(b)),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Date(d) => d.to_string(),
            SqlValue::Time(t) => t.to_string(),
            SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }
}

/// Escape special characters for COPY text format.
fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}

/// A batch of rows streamed from the source.
#[derive(Debug, Default)]
pub struct Batch {
    /// Rows in this batch.
    pub rows: Vec<Vec<SqlValue>>,
}

impl Batch {
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_text_scalars() {
        assert_eq!(SqlValue::Null(SqlNullType::String).to_copy_text(), "\\N");
        assert_eq!(SqlValue::Bool(true).to_copy_text(), "t");
        assert_eq!(SqlValue::Bool(false).to_copy_text(), "f");
        assert_eq!(SqlValue::I32(42).to_copy_text(), "42");
        assert_eq!(SqlValue::I64(-7).to_copy_text(), "-7");
    }

    #[test]
    fn test_copy_text_escaping() {
        assert_eq!(
            SqlValue::String("tab\there".into()).to_copy_text(),
            "tab\\there"
        );
        assert_eq!(
            SqlValue::String("new\nline".into()).to_copy_text(),
            "new\\nline"
        );
        assert_eq!(
            SqlValue::String("back\\slash".into()).to_copy_text(),
            "back\\\\slash"
        );
    }

    #[test]
    fn test_copy_text_bytes() {
        assert_eq!(
            SqlValue::Bytes(vec![0xde, 0xad]).to_copy_text(),
            "\\\\xdead"
        );
    }

    #[test]
    fn test_copy_text_temporal() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap();
        assert_eq!(
            SqlValue::DateTime(dt).to_copy_text(),
            "2024-03-05 10:20:30.000000"
        );
        assert_eq!(
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()).to_copy_text(),
            "2024-03-05"
        );
    }

    #[test]
    fn test_batch_len() {
        let batch = Batch::new(vec![vec![SqlValue::I32(1)], vec![SqlValue::I32(2)]]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }
}
