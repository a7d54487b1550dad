//! Explicit mapping between result rows and entities.
//!
//! A [`Layout`] names, for one [`EntityKind`], which row field feeds which
//! entity attribute. Table rows map 1:1; rows of a [`JoinPlan`] carry dotted
//! field names, so a nested layout reads `pilot.last_name` into the
//! `last_name` attribute of a person.
//!
//! [`JoinPlan`]: flightbook_core::JoinPlan
//!
//! # Examples
//!
//! ```
//! use flightbook_core::{flightlog, Value};
//! use flightbook_db::Layout;
//!
//! let schema = flightlog::schema();
//! let people = schema.table("people").unwrap();
//! let layout = Layout::nested(&flightlog::PERSON, people, "pilot");
//! assert_eq!(layout.field_for("last_name"), Some("pilot.last_name"));
//! assert_eq!(layout.id_field(), Some("pilot.id"));
//! ```

use std::sync::Arc;

use flightbook_core::{Entity, EntityKind, Row, RowShape, TableInfo, Value};

/// Field-to-attribute mapping for one entity kind.
#[derive(Debug, Clone)]
pub struct Layout {
    kind: &'static EntityKind,
    fields: Vec<(String, String)>,
    id_field: Option<String>,
}

impl Layout {
    /// An empty layout; add mappings with [`map`](Self::map).
    pub fn new(kind: &'static EntityKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            id_field: None,
        }
    }

    /// Maps every column of `table` to the attribute of the same name, and
    /// the id column to the entity id.
    pub fn for_table(kind: &'static EntityKind, table: &TableInfo) -> Self {
        Self::with_prefix(kind, table, None)
    }

    /// Like [`for_table`](Self::for_table), reading fields named
    /// `{prefix}.{column}`.
    pub fn nested(kind: &'static EntityKind, table: &TableInfo, prefix: &str) -> Self {
        Self::with_prefix(kind, table, Some(prefix))
    }

    fn with_prefix(kind: &'static EntityKind, table: &TableInfo, prefix: Option<&str>) -> Self {
        let field = |column: &str| match prefix {
            Some(prefix) => format!("{prefix}.{column}"),
            None => column.to_string(),
        };
        let id_name = table.id_column().map(|c| c.name());
        let mut layout = Self::new(kind);
        for column in table.column_names() {
            if Some(column) == id_name {
                layout.id_field = Some(field(column));
            } else {
                layout.fields.push((field(column), column.to_string()));
            }
        }
        layout
    }

    /// Adds a mapping from row field to attribute.
    pub fn map(mut self, field: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.fields.push((field.into(), attribute.into()));
        self
    }

    /// Sets the row field holding the entity id.
    pub fn with_id(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn kind(&self) -> &'static EntityKind {
        self.kind
    }

    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    /// Row field that feeds `attribute`.
    pub fn field_for(&self, attribute: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, a)| a == attribute)
            .map(|(f, _)| f.as_str())
    }

    /// Builds an entity from a row. Fields missing from the row are left
    /// unset.
    pub fn to_entity(&self, row: &Row) -> Entity {
        let mut entity = Entity::new(self.kind);
        for (field, attribute) in &self.fields {
            if let Some(value) = row.get(field) {
                entity.set(attribute.as_str(), value.clone());
            }
        }
        if let Some(id) = self
            .id_field
            .as_deref()
            .and_then(|f| row.get(f))
            .and_then(Value::as_i64)
        {
            entity.set_id(id);
        }
        entity
    }

    /// Builds a row of the attributes `entity` has set, plus its id once
    /// assigned. Field names are the layout's row fields.
    pub fn to_row(&self, entity: &Entity) -> Row {
        let mut names = Vec::new();
        let mut values = Vec::new();
        if let (Some(field), Some(id)) = (&self.id_field, entity.id()) {
            names.push(field.clone());
            values.push(Value::Integer(id));
        }
        for (field, attribute) in &self.fields {
            if let Some(value) = entity.values().get(attribute) {
                names.push(field.clone());
                values.push(value.clone());
            }
        }
        Row::new(Arc::new(RowShape::new(names)), values)
    }
}
