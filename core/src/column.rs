//! Per-column metadata and the typed parser derived from it.
//!
//! A [`ColumnInfo`] is built once from its declared data-type string. The
//! native type, the string parser and the textual date format are fixed at
//! that point; the builder methods only touch the remaining attributes.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::{Result, SchemaError};
use crate::value::{DATE_FORMAT, NativeType, Value};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w+)\s*\(\s*(\w+)\s*\)\s*$").expect("static regex must compile")
});

const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Target of a foreign-key column, written `table(column)`.
///
/// # Examples
///
/// ```
/// use flightbook_core::Reference;
///
/// let r: Reference = "people(id)".parse().unwrap();
/// assert_eq!(r.table, "people");
/// assert_eq!(r.column, "id");
/// assert!("people.id".parse::<Reference>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

impl Reference {
    /// Creates a reference without validation.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl FromStr for Reference {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = REFERENCE_RE
            .captures(s)
            .ok_or_else(|| SchemaError::InvalidReference(s.to_string()))?;
        Ok(Self::new(&caps[1], &caps[2]))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.column)
    }
}

/// Metadata for one table column.
///
/// # Examples
///
/// ```
/// use flightbook_core::{ColumnInfo, NativeType, Value};
///
/// let col = ColumnInfo::new("pilot", "INTEGER")
///     .references("people(id)")
///     .unwrap();
/// assert_eq!(col.native_type(), NativeType::Integer);
/// assert_eq!(col.parse("42").unwrap(), Value::Integer(42));
/// assert_eq!(col.parse("").unwrap(), Value::Null);
/// assert_eq!(col.reference_sql().as_deref(), Some("REFERENCES people(id)"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    name: String,
    data_type: String,
    nullable: bool,
    null_if_falsy: bool,
    default: Option<String>,
    extra: Option<String>,
    reference: Option<Reference>,
    native_type: NativeType,
}

impl ColumnInfo {
    /// Creates a nullable column and derives its native type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        let native_type = NativeType::from_data_type(&data_type);
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            null_if_falsy: false,
            default: None,
            extra: None,
            reference: None,
            native_type,
        }
    }

    /// Marks the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets nullability explicitly.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Converts parsed falsy values (0, empty text) to null.
    pub fn null_if_falsy(mut self) -> Self {
        self.null_if_falsy = true;
        self
    }

    /// Sets the raw default value.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the extra modifier, e.g. `AUTOINCREMENT`.
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Adds a foreign-key reference given as `table(column)`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidReference`] if the string does not
    /// match the pattern.
    pub fn references(self, reference: &str) -> Result<Self> {
        Ok(self.with_reference(reference.parse()?))
    }

    /// Adds an already parsed foreign-key reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Column name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared SQL type, e.g. `INTEGER` or `DATE`.
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Whether the column accepts null.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether parsing turns falsy values into null.
    pub fn forces_null_on_falsy(&self) -> bool {
        self.null_if_falsy
    }

    /// Raw default value, unquoted.
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Extra modifier such as `AUTOINCREMENT`.
    pub fn extra(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    /// Foreign-key target, if the column has one.
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    /// Native type derived from the declared type.
    pub fn native_type(&self) -> NativeType {
        self.native_type
    }

    /// Textual format for date and datetime columns.
    pub fn date_format(&self) -> Option<&'static str> {
        self.native_type.default_format()
    }

    /// Whether the extra modifier asks the engine to assign values.
    pub fn is_auto_increment(&self) -> bool {
        self.extra.as_deref().is_some_and(|extra| {
            let upper = extra.to_ascii_uppercase();
            upper.contains("AUTOINCREMENT") || upper.contains("AUTO_INCREMENT")
        })
    }

    /// Parses a raw string into the column's native type.
    ///
    /// Empty strings and the `NULL` / `None` sentinels parse to
    /// [`Value::Null`] for every type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::TypeConversion`] if the text is not a valid
    /// value of the native type.
    pub fn parse(&self, raw: &str) -> Result<Value> {
        let trimmed = raw.trim();
        if is_null_sentinel(trimmed) {
            return Ok(Value::Null);
        }

        let value = match self.native_type {
            NativeType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| self.conversion_error(raw))?,
            NativeType::Real => trimmed
                .replace(',', ".")
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| self.conversion_error(raw))?,
            NativeType::Text => Value::Text(raw.to_string()),
            NativeType::Date => parse_date(trimmed)
                .map(Value::Date)
                .ok_or_else(|| self.conversion_error(raw))?,
            NativeType::DateTime => parse_datetime(trimmed)
                .map(Value::DateTime)
                .ok_or_else(|| self.conversion_error(raw))?,
        };

        Ok(self.apply_null_if_falsy(value))
    }

    /// Coerces a value returned by an adapter to the native type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::TypeConversion`] when no lossless conversion
    /// exists.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        let coerced = match (self.native_type, value) {
            (_, Value::Null) => Value::Null,
            (_, Value::Text(s)) if self.native_type != NativeType::Text => return self.parse(&s),
            (NativeType::Integer, v @ Value::Integer(_)) => v,
            (NativeType::Integer, Value::Real(f)) if f.fract() == 0.0 => Value::Integer(f as i64),
            (NativeType::Real, v @ Value::Real(_)) => v,
            (NativeType::Real, Value::Integer(i)) => Value::Real(i as f64),
            (NativeType::Text, v) => Value::Text(v.to_string()),
            (NativeType::Date, v @ Value::Date(_)) => v,
            (NativeType::Date, Value::DateTime(dt)) => Value::Date(dt.date()),
            (NativeType::DateTime, v @ Value::DateTime(_)) => v,
            (NativeType::DateTime, Value::Date(d)) => d
                .and_hms_opt(0, 0, 0)
                .map(Value::DateTime)
                .ok_or_else(|| self.conversion_error(&d.to_string()))?,
            (_, other) => return Err(self.conversion_error(&other.to_string())),
        };
        Ok(self.apply_null_if_falsy(coerced))
    }

    /// Renders a value in the column's textual format; null renders empty.
    pub fn format(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// SQL `DEFAULT` clause, or an empty string when no default is set.
    ///
    /// Numeric defaults and parenthesised or keyword expressions are
    /// emitted verbatim; everything else becomes a quoted string literal.
    pub fn default_sql(&self) -> String {
        let Some(default) = self.default.as_deref() else {
            return String::new();
        };
        let numeric = matches!(self.native_type, NativeType::Integer | NativeType::Real)
            && default.trim().parse::<f64>().is_ok();
        let expression = default.starts_with('(')
            || default.eq_ignore_ascii_case("NULL")
            || default.to_ascii_uppercase().starts_with("CURRENT_");
        if numeric || expression {
            format!("DEFAULT {}", default.trim())
        } else {
            format!("DEFAULT '{}'", default.replace('\'', "''"))
        }
    }

    /// `REFERENCES table(column)` fragment for foreign-key columns.
    pub fn reference_sql(&self) -> Option<String> {
        self.reference
            .as_ref()
            .map(|r| format!("REFERENCES {}({})", r.table, r.column))
    }

    fn apply_null_if_falsy(&self, value: Value) -> Value {
        if self.null_if_falsy && value.is_falsy() {
            Value::Null
        } else {
            value
        }
    }

    fn conversion_error(&self, raw: &str) -> SchemaError {
        SchemaError::TypeConversion {
            column: self.name.clone(),
            value: raw.to_string(),
            expected: self.native_type.name().to_string(),
        }
    }
}

fn is_null_sentinel(s: &str) -> bool {
    s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none")
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_parsing() {
        let r: Reference = " vehicles ( id ) ".parse().unwrap();
        assert_eq!(r, Reference::new("vehicles", "id"));
        assert_eq!(r.to_string(), "vehicles(id)");

        for bad in ["vehicles", "vehicles()", "(id)", "vehicles(id", "a b(id)"] {
            assert!(matches!(
                bad.parse::<Reference>(),
                Err(SchemaError::InvalidReference(_))
            ));
        }
    }

    #[test]
    fn test_invalid_reference_on_column() {
        let err = ColumnInfo::new("pilot", "INTEGER").references("people.id");
        assert_eq!(
            err.unwrap_err(),
            SchemaError::InvalidReference("people.id".into())
        );
    }

    #[test]
    fn test_parse_integer_and_sentinels() {
        let col = ColumnInfo::new("count", "INTEGER");
        assert_eq!(col.parse(" 7 ").unwrap(), Value::Integer(7));
        assert_eq!(col.parse("NULL").unwrap(), Value::Null);
        assert_eq!(col.parse("None").unwrap(), Value::Null);
        assert!(matches!(
            col.parse("seven"),
            Err(SchemaError::TypeConversion { .. })
        ));
    }

    #[test]
    fn test_parse_real_accepts_decimal_comma() {
        let col = ColumnInfo::new("fee", "REAL");
        assert_eq!(col.parse("12,5").unwrap(), Value::Real(12.5));
    }

    #[test]
    fn test_parse_temporal() {
        let date = ColumnInfo::new("date", "DATE");
        let d = NaiveDate::from_ymd_opt(2023, 7, 14).unwrap();
        assert_eq!(date.parse("2023-07-14").unwrap(), Value::Date(d));
        assert_eq!(date.parse("2023-07-14 10:00:00").unwrap(), Value::Date(d));
        assert!(date.parse("14.07.2023").is_err());

        let dt = ColumnInfo::new("departure", "DATETIME");
        let expected = d.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(dt.parse("2023-07-14 10:30:00").unwrap(), Value::DateTime(expected));
        assert_eq!(dt.parse("2023-07-14T10:30").unwrap(), Value::DateTime(expected));
        assert_eq!(dt.date_format(), Some("%Y-%m-%d %H:%M:%S"));
    }

    #[test]
    fn test_null_if_falsy() {
        let col = ColumnInfo::new("launch", "INTEGER").null_if_falsy();
        assert_eq!(col.parse("0").unwrap(), Value::Null);
        assert_eq!(col.parse("3").unwrap(), Value::Integer(3));
        assert_eq!(col.coerce(Value::Integer(0)).unwrap(), Value::Null);
    }

    #[test]
    fn test_coerce() {
        let real = ColumnInfo::new("fee", "REAL");
        assert_eq!(real.coerce(Value::Integer(3)).unwrap(), Value::Real(3.0));
        let int = ColumnInfo::new("count", "INTEGER");
        assert_eq!(int.coerce(Value::Text("4".into())).unwrap(), Value::Integer(4));
        assert!(int.coerce(Value::Real(1.5)).is_err());
        let text = ColumnInfo::new("name", "TEXT");
        assert_eq!(text.coerce(Value::Integer(4)).unwrap(), Value::Text("4".into()));
        let dt = ColumnInfo::new("at", "DATETIME");
        let d = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(
            dt.coerce(Value::Date(d)).unwrap(),
            Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_default_sql() {
        assert_eq!(ColumnInfo::new("n", "INTEGER").default_sql(), "");
        assert_eq!(
            ColumnInfo::new("n", "INTEGER").with_default("0").default_sql(),
            "DEFAULT 0"
        );
        assert_eq!(
            ColumnInfo::new("s", "TEXT").with_default("O'Hara").default_sql(),
            "DEFAULT 'O''Hara'"
        );
        assert_eq!(
            ColumnInfo::new("t", "DATETIME")
                .with_default("CURRENT_TIMESTAMP")
                .default_sql(),
            "DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_auto_increment_detection() {
        assert!(ColumnInfo::new("id", "INTEGER").with_extra("AUTOINCREMENT").is_auto_increment());
        assert!(!ColumnInfo::new("id", "INTEGER").is_auto_increment());
    }
}
