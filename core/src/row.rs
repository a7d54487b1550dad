//! Named, ordered row shapes and the rows built on them.

use std::sync::Arc;

use crate::value::Value;

/// Ordered field names of a row.
///
/// A table derives its shape from its column order; a join plan derives one
/// from the dotted paths of its leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowShape {
    fields: Vec<String>,
}

impl RowShape {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field, if present.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }
}

/// A row of values addressed by field name.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use flightbook_core::{Row, RowShape, Value};
///
/// let shape = Arc::new(RowShape::new(vec!["id".into(), "name".into()]));
/// let row = Row::new(shape, vec![Value::from(1), Value::from("Ada")]);
/// assert_eq!(row.get("name"), Some(&Value::from("Ada")));
/// assert_eq!(row.get("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    shape: Arc<RowShape>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row; missing trailing values are filled with null.
    pub fn new(shape: Arc<RowShape>, mut values: Vec<Value>) -> Self {
        debug_assert!(values.len() <= shape.len(), "more values than fields");
        values.resize(shape.len(), Value::Null);
        Self { shape, values }
    }

    pub fn shape(&self) -> &RowShape {
        &self.shape
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value of the named field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.shape.index_of(field).map(|i| &self.values[i])
    }

    /// `(field, value)` pairs in shape order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.shape
            .fields()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
