//! Typed cell values and the native types they are coerced to.
//!
//! Every column declares a free-form data-type string (`INTEGER`,
//! `VARCHAR(40)`, `DATETIME`, ...). [`NativeType::from_data_type`] reduces
//! it to one of five semantic types, and [`Value`] carries a cell of one of
//! those types (or [`Value::Null`]).

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Textual format used for [`Value::Date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Textual format used for [`Value::DateTime`].
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Semantic type derived from a declared data-type string.
///
/// # Examples
///
/// ```
/// use flightbook_core::NativeType;
///
/// assert_eq!(NativeType::from_data_type("INTEGER"), NativeType::Integer);
/// assert_eq!(NativeType::from_data_type("varchar(40)"), NativeType::Text);
/// assert_eq!(NativeType::from_data_type("DATETIME"), NativeType::DateTime);
/// assert_eq!(NativeType::from_data_type("date"), NativeType::Date);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    /// Whole numbers (also booleans).
    Integer,
    /// Floating point numbers.
    Real,
    /// Anything without a more specific affinity.
    Text,
    /// Calendar date.
    Date,
    /// Date and time of day, no time zone.
    DateTime,
}

impl NativeType {
    /// Derives the native type from a declared data-type string.
    ///
    /// Matching is case-insensitive and substring based, so `BIGINT`,
    /// `INT(11)` and `INTEGER` all map to [`NativeType::Integer`].
    pub fn from_data_type(data_type: &str) -> Self {
        let upper = data_type.to_ascii_uppercase();
        if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            NativeType::DateTime
        } else if upper.contains("DATE") {
            NativeType::Date
        } else if upper.contains("INT") || upper.contains("BOOL") {
            NativeType::Integer
        } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"]
            .iter()
            .any(|affinity| upper.contains(affinity))
        {
            NativeType::Real
        } else {
            NativeType::Text
        }
    }

    /// Default textual format for temporal types.
    pub fn default_format(self) -> Option<&'static str> {
        match self {
            NativeType::Date => Some(DATE_FORMAT),
            NativeType::DateTime => Some(DATETIME_FORMAT),
            _ => None,
        }
    }

    /// Lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            NativeType::Integer => "integer",
            NativeType::Real => "real",
            NativeType::Text => "text",
            NativeType::Date => "date",
            NativeType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
///
/// Reals compare and hash by bit pattern so that values can be used as
/// natural-key components in hashed collections.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if the value counts as present for a natural key:
    /// not null and not empty text.
    pub fn is_present(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Returns `true` for null, zero and empty text.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Integer(v) => *v == 0,
            Value::Real(v) => *v == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Date(_) | Value::DateTime(_) => false,
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a point in time; dates map to midnight.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    /// Name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(v) => v.hash(state),
            Value::Real(v) => v.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(dt) => dt.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_native_type_affinity() {
        assert_eq!(NativeType::from_data_type("BIGINT"), NativeType::Integer);
        assert_eq!(NativeType::from_data_type("boolean"), NativeType::Integer);
        assert_eq!(NativeType::from_data_type("DOUBLE PRECISION"), NativeType::Real);
        assert_eq!(NativeType::from_data_type("decimal(8,2)"), NativeType::Real);
        assert_eq!(NativeType::from_data_type("TIMESTAMP"), NativeType::DateTime);
        assert_eq!(NativeType::from_data_type("CHAR(3)"), NativeType::Text);
        assert_eq!(NativeType::from_data_type(""), NativeType::Text);
    }

    #[test]
    fn test_presence_and_falsiness() {
        assert!(!Value::Null.is_present());
        assert!(!Value::from("").is_present());
        assert!(Value::from(0).is_present());
        assert!(Value::from(0).is_falsy());
        assert!(Value::from(0.0).is_falsy());
        assert!(!Value::from("x").is_falsy());
    }

    #[test]
    fn test_real_values_hash_by_bits() {
        let mut set = HashSet::new();
        set.insert(Value::from(1.5));
        set.insert(Value::from(1.5));
        set.insert(Value::from(1));
        assert_eq!(set.len(), 2);
        assert_ne!(Value::from(1), Value::from(1.0));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::from("a"));
    }

    #[test]
    fn test_display_temporal() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(Value::from(d).to_string(), "2024-05-01");
        let dt = d.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(Value::from(dt).to_string(), "2024-05-01 13:05:00");
        assert_eq!(Value::from(d).as_datetime(), d.and_hms_opt(0, 0, 0));
    }
}
