//! Flat, serializable schema descriptors.
//!
//! The persisted form of a schema maps each table name to its column and
//! index descriptors. Every descriptor is a flat field/value record; an
//! index spanning several columns appears as one descriptor per column,
//! tied together by the index name and ordered by `sequence`.
//!
//! ```yaml
//! people:
//!   columns:
//!     - { name: id, type: INTEGER, nullable: false, extra: AUTOINCREMENT }
//!     - { name: last_name, type: TEXT, nullable: false }
//!   indices:
//!     - { index: pk_people, column: id, primary: true, unique: true }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::ColumnInfo;
use crate::error::Result;
use crate::index::{IndexBuilder, IndexInfo, SortOrder};
use crate::schema::Schema;
use crate::table::TableInfo;

fn default_true() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub null_if_falsy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    /// `table(column)` of a foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// One column of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub index: String,
    pub column: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub order: SortOrder,
    /// Zero-based slot; omitted slots follow the previous one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
}

/// Columns and indices of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub indices: Vec<IndexDescriptor>,
}

/// Persisted schema: table name to table descriptor.
pub type SchemaDescriptor = BTreeMap<String, TableDescriptor>;

impl ColumnInfo {
    /// Builds a column from its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidReference`](crate::SchemaError::InvalidReference)
    /// for a malformed reference.
    pub fn from_descriptor(desc: &ColumnDescriptor) -> Result<Self> {
        let mut column = ColumnInfo::new(&desc.name, &desc.data_type).with_nullable(desc.nullable);
        if desc.null_if_falsy {
            column = column.null_if_falsy();
        }
        if let Some(default) = &desc.default {
            column = column.with_default(default);
        }
        if let Some(extra) = &desc.extra {
            column = column.with_extra(extra);
        }
        if let Some(reference) = &desc.reference {
            column = column.references(reference)?;
        }
        Ok(column)
    }

    pub fn to_descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            name: self.name().to_string(),
            data_type: self.data_type().to_string(),
            nullable: self.is_nullable(),
            null_if_falsy: self.forces_null_on_falsy(),
            default: self.default().map(String::from),
            extra: self.extra().map(String::from),
            reference: self.reference().map(|r| r.to_string()),
        }
    }
}

impl IndexInfo {
    /// One descriptor per indexed column, with explicit slots.
    pub fn to_descriptors(&self) -> Vec<IndexDescriptor> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(slot, column)| IndexDescriptor {
                index: self.name().to_string(),
                column: column.name.clone(),
                unique: self.is_unique(),
                primary: self.is_primary(),
                order: column.order,
                sequence: Some(slot),
            })
            .collect()
    }
}

impl TableInfo {
    /// Builds a table from its descriptor.
    ///
    /// # Errors
    ///
    /// Fails on invalid references, duplicate columns, or index
    /// descriptors that leave a slot empty, which includes any `sequence`
    /// at or past the number of rows given for that index.
    pub fn from_descriptor(name: &str, desc: &TableDescriptor) -> Result<Self> {
        let mut table = TableInfo::new(name);
        for column in &desc.columns {
            table.add_column(ColumnInfo::from_descriptor(column)?)?;
        }

        let mut builders: BTreeMap<&str, IndexBuilder> = BTreeMap::new();
        for entry in &desc.indices {
            let mut builder = builders
                .remove(entry.index.as_str())
                .unwrap_or_else(|| IndexInfo::builder(&entry.index));
            // Flags are sticky across the rows of one index.
            if entry.unique {
                builder = builder.unique(true);
            }
            if entry.primary {
                builder = builder.primary(true);
            }
            builder = builder.add_column(&entry.column, entry.order, entry.sequence);
            builders.insert(&entry.index, builder);
        }
        for builder in builders.into_values() {
            table.add_index(builder.build()?);
        }

        Ok(table)
    }

    pub fn to_descriptor(&self) -> TableDescriptor {
        TableDescriptor {
            columns: self.columns().iter().map(ColumnInfo::to_descriptor).collect(),
            indices: self
                .indices()
                .into_iter()
                .flat_map(IndexInfo::to_descriptors)
                .collect(),
        }
    }
}

impl Schema {
    /// Builds a schema from its persisted form.
    pub fn from_descriptors(desc: &SchemaDescriptor) -> Result<Self> {
        let mut schema = Schema::new();
        for (name, table) in desc {
            schema.insert(TableInfo::from_descriptor(name, table)?);
        }
        Ok(schema)
    }

    pub fn to_descriptors(&self) -> SchemaDescriptor {
        self.tables()
            .map(|t| (t.name().to_string(), t.to_descriptor()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::flightlog;

    #[test]
    fn test_flightlog_round_trip() {
        let schema = flightlog::schema();
        let desc = schema.to_descriptors();
        let restored = Schema::from_descriptors(&desc).unwrap();
        assert_eq!(restored, schema);
        assert_eq!(restored.to_descriptors(), desc);
    }

    #[test]
    fn test_json_round_trip() {
        let desc = flightlog::schema().to_descriptors();
        let json = serde_json::to_string_pretty(&desc).unwrap();
        let parsed: SchemaDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn test_index_rows_out_of_order() {
        let json = r#"{
            "columns": [
                {"name": "a", "type": "INTEGER"},
                {"name": "b", "type": "TEXT"}
            ],
            "indices": [
                {"index": "ab", "column": "b", "order": "DESC", "sequence": 1, "unique": true},
                {"index": "ab", "column": "a", "sequence": 0, "unique": true}
            ]
        }"#;
        let desc: TableDescriptor = serde_json::from_str(json).unwrap();
        let table = TableInfo::from_descriptor("t", &desc).unwrap();
        let index = table.index("ab").unwrap();
        assert_eq!(index.key_format(), "(a ASC, b DESC)");
        assert!(index.is_unique());
        assert!(table.column("a").unwrap().is_nullable());
    }

    #[test]
    fn test_index_gap_fails() {
        let desc = TableDescriptor {
            columns: vec![],
            indices: vec![IndexDescriptor {
                index: "gappy".into(),
                column: "x".into(),
                unique: false,
                primary: false,
                order: SortOrder::Asc,
                sequence: Some(1),
            }],
        };
        assert!(matches!(
            TableInfo::from_descriptor("t", &desc),
            Err(SchemaError::IncompleteIndex { slot: 0, .. })
        ));
    }

    #[test]
    fn test_out_of_range_sequence_fails() {
        for sequence in ["18446744073709551615", "1000000000000"] {
            let json = format!(
                r#"{{
                    "columns": [{{"name": "a", "type": "INTEGER"}}],
                    "indices": [{{"index": "ix", "column": "a", "sequence": {sequence}}}]
                }}"#
            );
            let desc: TableDescriptor = serde_json::from_str(&json).unwrap();
            assert!(matches!(
                TableInfo::from_descriptor("t", &desc),
                Err(SchemaError::IncompleteIndex { slot: 0, .. })
            ));
        }
    }

    #[test]
    fn test_bad_reference_fails() {
        let desc = TableDescriptor {
            columns: vec![ColumnDescriptor {
                name: "pilot".into(),
                data_type: "INTEGER".into(),
                nullable: true,
                null_if_falsy: false,
                default: None,
                extra: None,
                reference: Some("people".into()),
            }],
            indices: vec![],
        };
        assert!(matches!(
            TableInfo::from_descriptor("missions", &desc),
            Err(SchemaError::InvalidReference(_))
        ));
    }
}
