//! Conversion between [`Value`] and SQLite values.
//!
//! SQLite has no date types; dates and datetimes are stored as text in the
//! canonical formats and come back as text, for the store to coerce by
//! column type.

use flightbook_core::{DATE_FORMAT, DATETIME_FORMAT, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::error::{Result, SqliteError};

/// Converts a [`Value`] for binding as a statement parameter.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
    }
}

/// Converts a result column into a [`Value`].
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] for blobs and text that is not
/// valid UTF-8.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(f) => Ok(Value::Real(f)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| SqliteError::ConversionError(format!("invalid UTF-8 text: {e}"))),
        ValueRef::Blob(bytes) => Err(SqliteError::ConversionError(format!(
            "unsupported blob of {} bytes",
            bytes.len()
        ))),
    }
}

/// Reads the first `width` columns of a result row.
pub(crate) fn read_row(row: &rusqlite::Row<'_>, width: usize) -> Result<Vec<Value>> {
    (0..width).map(|i| from_sql(row.get_ref(i)?)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::Connection;

    #[test]
    fn test_dates_are_stored_as_text() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(to_sql(&Value::Date(d)), SqlValue::Text("2024-06-01".into()));
        assert_eq!(
            to_sql(&Value::DateTime(d.and_hms_opt(9, 30, 0).unwrap())),
            SqlValue::Text("2024-06-01 09:30:00".into())
        );
    }

    #[test]
    fn test_read_row() {
        let conn = Connection::open_in_memory().unwrap();
        let values = conn
            .query_row("SELECT 1, 2.5, 'x', NULL", [], |row| {
                Ok(read_row(row, 4))
            })
            .unwrap()
            .unwrap();
        assert_eq!(
            values,
            [
                Value::Integer(1),
                Value::Real(2.5),
                Value::from("x"),
                Value::Null
            ]
        );
    }

    #[test]
    fn test_blob_is_rejected() {
        assert!(from_sql(ValueRef::Blob(&[1, 2])).is_err());
    }
}
