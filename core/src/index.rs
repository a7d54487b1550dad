//! Index metadata with explicit column slots.
//!
//! Indices are assembled through [`IndexBuilder`], which lets columns be
//! placed at explicit positions (as they come out of catalog tables, in no
//! particular order) and refuses to produce an [`IndexInfo`] while any slot
//! is still empty.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Sort direction of an indexed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// `ASC` or `DESC`.
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Sort direction.
    pub order: SortOrder,
}

/// A complete index: every slot filled, in order.
///
/// # Examples
///
/// ```
/// use flightbook_core::{IndexInfo, SortOrder};
///
/// let index = IndexInfo::builder("missions_by_day")
///     .unique(true)
///     .add_column("departure", SortOrder::Desc, Some(1))
///     .add_column("date", SortOrder::Asc, Some(0))
///     .build()
///     .unwrap();
/// assert_eq!(index.key_format(), "(date ASC, departure DESC)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    name: String,
    unique: bool,
    primary: bool,
    columns: Vec<IndexColumn>,
}

impl IndexInfo {
    /// Starts building an index with the given name.
    pub fn builder(name: impl Into<String>) -> IndexBuilder {
        IndexBuilder {
            name: name.into(),
            unique: false,
            primary: false,
            slots: BTreeMap::new(),
        }
    }

    /// Shorthand for the single-column ascending primary index.
    pub fn id_index(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: true,
            primary: true,
            columns: vec![IndexColumn {
                name: column.into(),
                order: SortOrder::Asc,
            }],
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the index enforces uniqueness; true for primary indices.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether this is the primary index.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Indexed columns in sequence order.
    pub fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    /// Whether this is a single-column, ascending, primary index.
    pub fn is_id_index(&self) -> bool {
        self.primary && self.columns.len() == 1 && self.columns[0].order == SortOrder::Asc
    }

    /// Renders the column list with direction markers, e.g. `(a ASC, b DESC)`.
    pub fn key_format(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.order))
            .collect();
        format!("({})", cols.join(", "))
    }

    /// DDL emission order: primary indices first, then by name.
    pub fn ddl_order(a: &IndexInfo, b: &IndexInfo) -> Ordering {
        b.primary.cmp(&a.primary).then_with(|| a.name.cmp(&b.name))
    }
}

/// Incremental constructor for [`IndexInfo`].
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    name: String,
    unique: bool,
    primary: bool,
    slots: BTreeMap<usize, IndexColumn>,
}

impl IndexBuilder {
    /// Marks the index unique.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Primary indices are implicitly unique.
    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        if primary {
            self.unique = true;
        }
        self
    }

    /// Places a column at the zero-based `sequence` slot.
    ///
    /// Without an explicit slot the column goes right after the highest
    /// occupied slot. Skipped slots stay empty until filled by a later call;
    /// a later call for an occupied slot overwrites it. Slots are kept
    /// sparse, so an absurd `sequence` only surfaces as a gap in
    /// [`build`](Self::build).
    pub fn add_column(
        mut self,
        name: impl Into<String>,
        order: SortOrder,
        sequence: Option<usize>,
    ) -> Self {
        let slot = sequence.unwrap_or_else(|| {
            self.slots
                .last_key_value()
                .map_or(0, |(last, _)| last.saturating_add(1))
        });
        self.slots.insert(
            slot,
            IndexColumn {
                name: name.into(),
                order,
            },
        );
        self
    }

    /// Finishes the index.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::IncompleteIndex`] if any slot is empty,
    /// including the case of an index without columns (slot 0).
    pub fn build(self) -> Result<IndexInfo> {
        let mut columns = Vec::with_capacity(self.slots.len());
        for (expected, (slot, column)) in self.slots.into_iter().enumerate() {
            if slot != expected {
                return Err(SchemaError::IncompleteIndex {
                    index: self.name,
                    slot: expected,
                });
            }
            columns.push(column);
        }
        if columns.is_empty() {
            return Err(SchemaError::IncompleteIndex {
                index: self.name,
                slot: 0,
            });
        }
        Ok(IndexInfo {
            name: self.name,
            unique: self.unique,
            primary: self.primary,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_assigned_slots() {
        let index = IndexInfo::builder("people_name")
            .add_column("last_name", SortOrder::Asc, None)
            .add_column("first_name", SortOrder::Asc, None)
            .build()
            .unwrap();
        let names: Vec<_> = index.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["last_name", "first_name"]);
        assert!(!index.is_unique());
    }

    #[test]
    fn test_gap_is_an_error() {
        let err = IndexInfo::builder("broken")
            .add_column("b", SortOrder::Asc, Some(2))
            .add_column("a", SortOrder::Asc, Some(0))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::IncompleteIndex {
                index: "broken".into(),
                slot: 1
            }
        );
    }

    #[test]
    fn test_gap_filled_later_is_fine() {
        let index = IndexInfo::builder("filled")
            .add_column("c", SortOrder::Asc, Some(2))
            .add_column("a", SortOrder::Asc, Some(0))
            .add_column("b", SortOrder::Desc, Some(1))
            .build()
            .unwrap();
        assert_eq!(index.key_format(), "(a ASC, b DESC, c ASC)");
    }

    #[test]
    fn test_huge_sequence_is_a_gap() {
        let err = IndexInfo::builder("far")
            .add_column("a", SortOrder::Asc, Some(1_000_000_000_000))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::IncompleteIndex {
                index: "far".into(),
                slot: 0
            }
        );
    }

    #[test]
    fn test_max_sequence_does_not_overflow() {
        let err = IndexInfo::builder("edge")
            .add_column("a", SortOrder::Asc, Some(0))
            .add_column("b", SortOrder::Asc, Some(usize::MAX))
            .add_column("c", SortOrder::Asc, None)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::IncompleteIndex { slot: 1, .. }));
    }

    #[test]
    fn test_empty_index_is_an_error() {
        assert!(IndexInfo::builder("empty").build().is_err());
    }

    #[test]
    fn test_id_index() {
        let index = IndexInfo::id_index("pk_people", "id");
        assert!(index.is_id_index());
        assert!(index.is_unique());

        let desc = IndexInfo::builder("pk_desc")
            .primary(true)
            .add_column("id", SortOrder::Desc, None)
            .build()
            .unwrap();
        assert!(!desc.is_id_index());
    }

    #[test]
    fn test_ddl_order_primary_first_then_name() {
        let mut indices = vec![
            IndexInfo::builder("b_idx")
                .add_column("x", SortOrder::Asc, None)
                .build()
                .unwrap(),
            IndexInfo::builder("a_idx")
                .add_column("y", SortOrder::Asc, None)
                .build()
                .unwrap(),
            IndexInfo::id_index("z_pk", "id"),
        ];
        indices.sort_by(IndexInfo::ddl_order);
        let names: Vec<_> = indices.iter().map(IndexInfo::name).collect();
        assert_eq!(names, ["z_pk", "a_idx", "b_idx"]);
    }
}
