//! Table metadata: columns, indices and the derived row shape.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use crate::column::{ColumnInfo, Reference};
use crate::error::{Result, SchemaError};
use crate::index::IndexInfo;
use crate::placeholder::Placeholder;
use crate::row::RowShape;

/// Columns and indices of one table.
///
/// The row shape is derived lazily from the column order and cached until
/// the next [`add_column`](Self::add_column). Index changes leave it alone.
///
/// # Examples
///
/// ```
/// use flightbook_core::{ColumnInfo, IndexInfo, Placeholder, TableInfo};
///
/// let mut people = TableInfo::new("people");
/// people.add_column(ColumnInfo::new("id", "INTEGER")).unwrap();
/// people.add_column(ColumnInfo::new("last_name", "TEXT")).unwrap();
/// people.add_index(IndexInfo::id_index("pk_people", "id"));
///
/// assert_eq!(people.primary_key(), "PRIMARY KEY (id ASC)");
/// assert_eq!(people.id_column().unwrap().name(), "id");
/// assert_eq!(people.format(&Placeholder::positional()), "(?, ?)");
/// assert_eq!(people.row_shape().fields(), ["id", "last_name"]);
/// ```
#[derive(Debug, Clone)]
pub struct TableInfo {
    name: String,
    columns: Vec<ColumnInfo>,
    indices: BTreeMap<String, IndexInfo>,
    row_shape: OnceLock<Arc<RowShape>>,
}

impl TableInfo {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indices: BTreeMap::new(),
            row_shape: OnceLock::new(),
        }
    }

    /// Builds a table from columns in order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateColumn`] on a repeated column name.
    pub fn with_columns(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = ColumnInfo>,
    ) -> Result<Self> {
        let mut table = Self::new(name);
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a column and invalidates the cached row shape.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateColumn`] if a column with the same
    /// name already exists.
    pub fn add_column(&mut self, column: ColumnInfo) -> Result<()> {
        if self.column(column.name()).is_some() {
            return Err(SchemaError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name().to_string(),
            });
        }
        self.columns.push(column);
        self.row_shape = OnceLock::new();
        Ok(())
    }

    /// Adds or replaces an index by name.
    pub fn add_index(&mut self, index: IndexInfo) {
        self.indices.insert(index.name().to_string(), index);
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Like [`column`](Self::column) but fails on unknown names.
    pub fn require_column(&self, name: &str) -> Result<&ColumnInfo> {
        self.column(name).ok_or_else(|| SchemaError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(ColumnInfo::name)
    }

    /// Index by name.
    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indices.get(name)
    }

    /// Indices in DDL emission order (primary first, then by name).
    pub fn indices(&self) -> Vec<&IndexInfo> {
        let mut indices: Vec<&IndexInfo> = self.indices.values().collect();
        indices.sort_by(|a, b| IndexInfo::ddl_order(a, b));
        indices
    }

    /// The single-column ascending primary index, if any.
    pub fn id_index(&self) -> Option<&IndexInfo> {
        self.indices().into_iter().find(|i| i.is_id_index())
    }

    /// Column covered by the id index.
    pub fn id_column(&self) -> Option<&ColumnInfo> {
        self.id_index()
            .and_then(|index| self.column(&index.columns()[0].name))
    }

    /// `PRIMARY KEY (...)` clause of the first primary index, or empty.
    pub fn primary_key(&self) -> String {
        self.indices()
            .into_iter()
            .find(|i| i.is_primary())
            .map(|i| format!("PRIMARY KEY {}", i.key_format()))
            .unwrap_or_default()
    }

    /// Foreign-key columns with their targets, in column order.
    pub fn references(&self) -> impl Iterator<Item = (&ColumnInfo, &Reference)> {
        self.columns
            .iter()
            .filter_map(|c| c.reference().map(|r| (c, r)))
    }

    /// Referenced column names grouped by referenced table.
    pub fn get_references(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut refs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (_, reference) in self.references() {
            refs.entry(reference.table.clone())
                .or_default()
                .insert(reference.column.clone());
        }
        refs
    }

    /// Whether some column references this table itself.
    pub fn is_self_referencing(&self) -> bool {
        self.references().any(|(_, r)| r.table == self.name)
    }

    /// Placeholder tuple sized to the column count, for bulk inserts.
    pub fn format(&self, placeholder: &Placeholder) -> String {
        placeholder.tuple(self.column_names())
    }

    /// Row shape mirroring the column order, cached until the next column
    /// is added.
    pub fn row_shape(&self) -> Arc<RowShape> {
        self.row_shape
            .get_or_init(|| Arc::new(RowShape::new(self.column_names().map(String::from).collect())))
            .clone()
    }

    /// Row shape with fields renamed through `aliases` (column → field).
    /// Columns without an alias keep their own name. Never cached.
    pub fn row_shape_with_aliases(&self, aliases: &HashMap<String, String>) -> RowShape {
        RowShape::new(
            self.column_names()
                .map(|c| aliases.get(c).cloned().unwrap_or_else(|| c.to_string()))
                .collect(),
        )
    }
}

impl PartialEq for TableInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.columns == other.columns && self.indices == other.indices
    }
}
