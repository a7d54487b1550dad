//! The table set and the dependency-graph operations over it.
//!
//! Edges of the dependency graph point from a referencing table to the
//! table it references. [`sort_tables`] orders tables so that every table
//! comes after the tables it references, which is the order in which they
//! can be created; [`Schema::dependencies`] answers the reverse question
//! ("who points at this table?") for cascading key rewrites.
//!
//! # Examples
//!
//! ```
//! use flightbook_core::{ColumnInfo, Schema, TableInfo};
//!
//! let mut schema = Schema::new();
//! schema.insert(TableInfo::with_columns("c", [
//!     ColumnInfo::new("b", "INTEGER").references("b(id)").unwrap(),
//! ]).unwrap());
//! schema.insert(TableInfo::with_columns("b", [
//!     ColumnInfo::new("id", "INTEGER"),
//!     ColumnInfo::new("a", "INTEGER").references("a(id)").unwrap(),
//! ]).unwrap());
//! schema.insert(TableInfo::with_columns("a", [ColumnInfo::new("id", "INTEGER")]).unwrap());
//!
//! let order: Vec<&str> = schema.sorted_tables().unwrap().iter().map(|t| t.name()).collect();
//! assert_eq!(order, ["a", "b", "c"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SchemaError};
use crate::table::TableInfo;

/// One column elsewhere in the schema that references a given table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dependency {
    /// Column of the referenced table that is pointed at (usually `id`).
    pub column: String,
    /// Referencing table.
    pub table: String,
    /// Referencing column in that table.
    pub foreign_column: String,
}

/// Mapping of table name to table metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    tables: BTreeMap<String, TableInfo>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table by name.
    pub fn insert(&mut self, table: TableInfo) {
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn get(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableInfo> {
        self.tables.get_mut(name)
    }

    /// Like [`get`](Self::get) but fails on unknown tables.
    pub fn table(&self, name: &str) -> Result<&TableInfo> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All tables in creation order; see [`sort_tables`].
    pub fn sorted_tables(&self) -> Result<Vec<&TableInfo>> {
        sort_tables(self.tables())
    }

    /// Every column in the schema that references `table`.
    ///
    /// Results come in referencing-table name order, then column order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTable`] if `table` is not in the schema.
    pub fn dependencies(&self, table: &str) -> Result<Vec<Dependency>> {
        self.table(table)?;
        let mut deps = Vec::new();
        for other in self.tables() {
            for (column, reference) in other.references() {
                if reference.table == table {
                    deps.push(Dependency {
                        column: reference.column.clone(),
                        table: other.name().to_string(),
                        foreign_column: column.name().to_string(),
                    });
                }
            }
        }
        Ok(deps)
    }
}

impl FromIterator<TableInfo> for Schema {
    fn from_iter<I: IntoIterator<Item = TableInfo>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for table in iter {
            schema.insert(table);
        }
        schema
    }
}

/// Orders tables so that each one follows every table it references.
///
/// Works in rounds: each round takes the unordered tables whose referenced
/// tables are all ordered already and appends them by ascending name.
/// References to tables outside the given set, and a table's references to
/// itself, are not edges.
///
/// # Errors
///
/// Returns [`SchemaError::SchemaCycle`] with the unordered tables when a
/// round makes no progress. No partial order is returned.
pub fn sort_tables<'a>(tables: impl IntoIterator<Item = &'a TableInfo>) -> Result<Vec<&'a TableInfo>> {
    let mut pending: BTreeMap<&str, &'a TableInfo> =
        tables.into_iter().map(|t| (t.name(), t)).collect();
    let present: BTreeSet<&str> = pending.keys().copied().collect();

    let edges: BTreeMap<&str, BTreeSet<String>> = pending
        .iter()
        .map(|(name, table)| {
            let targets = table
                .get_references()
                .into_keys()
                .filter(|target| target != name && present.contains(target.as_str()))
                .collect();
            (*name, targets)
        })
        .collect();

    let mut ordered: Vec<&'a TableInfo> = Vec::with_capacity(pending.len());
    let mut done: BTreeSet<&str> = BTreeSet::new();

    while !pending.is_empty() {
        // BTreeMap iteration gives the ascending-name tie-break for free.
        let ready: Vec<&str> = pending
            .keys()
            .copied()
            .filter(|name| edges[name].iter().all(|t| done.contains(t.as_str())))
            .collect();

        if ready.is_empty() {
            return Err(SchemaError::SchemaCycle {
                remaining: pending.keys().map(|s| s.to_string()).collect(),
            });
        }

        for name in ready {
            if let Some(table) = pending.remove(name) {
                ordered.push(table);
                done.insert(name);
            }
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnInfo;

    fn table(name: &str, refs: &[&str]) -> TableInfo {
        let mut t = TableInfo::new(name);
        t.add_column(ColumnInfo::new("id", "INTEGER")).unwrap();
        for (i, target) in refs.iter().enumerate() {
            t.add_column(
                ColumnInfo::new(format!("ref{i}"), "INTEGER")
                    .references(&format!("{target}(id)"))
                    .unwrap(),
            )
            .unwrap();
        }
        t
    }

    fn names(tables: &[&TableInfo]) -> Vec<String> {
        tables.iter().map(|t| t.name().to_string()).collect()
    }

    #[test]
    fn test_chain_sorts_leaves_first() {
        let a = table("a", &[]);
        let b = table("b", &["a"]);
        let c = table("c", &["b"]);
        let sorted = sort_tables([&c, &b, &a]).unwrap();
        assert_eq!(names(&sorted), ["a", "b", "c"]);
    }

    #[test]
    fn test_ties_broken_by_name() {
        let root = table("root", &[]);
        let z = table("zeta", &["root"]);
        let y = table("alpha", &["root"]);
        let sorted = sort_tables([&z, &root, &y]).unwrap();
        assert_eq!(names(&sorted), ["root", "alpha", "zeta"]);
    }

    #[test]
    fn test_every_table_after_its_references() {
        let schema: Schema = [
            table("people", &[]),
            table("vehicles", &[]),
            table("person_properties", &["people"]),
            table("missions", &["vehicles", "people", "people", "missions"]),
            table("invoices", &["missions", "people"]),
        ]
        .into_iter()
        .collect();
        let sorted = schema.sorted_tables().unwrap();
        assert_eq!(sorted.len(), 5);
        for (pos, t) in sorted.iter().enumerate() {
            for target in t.get_references().keys() {
                if target == t.name() {
                    continue;
                }
                let target_pos = sorted.iter().position(|s| s.name() == target).unwrap();
                assert!(target_pos < pos, "{target} must precede {}", t.name());
            }
        }
    }

    #[test]
    fn test_cycle_is_an_error() {
        let a = table("a", &["c"]);
        let b = table("b", &["a"]);
        let c = table("c", &["b"]);
        let free = table("free", &[]);
        let err = sort_tables([&a, &b, &c, &free]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::SchemaCycle {
                remaining: vec!["a".into(), "b".into(), "c".into()]
            }
        );
    }

    #[test]
    fn test_references_outside_set_are_ignored() {
        let b = table("b", &["external"]);
        let sorted = sort_tables([&b]).unwrap();
        assert_eq!(names(&sorted), ["b"]);
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let m = table("missions", &["missions"]);
        assert_eq!(names(&sort_tables([&m]).unwrap()), ["missions"]);
    }

    #[test]
    fn test_dependencies() {
        let schema: Schema = [
            table("people", &[]),
            table("missions", &["people", "people"]),
            table("notes", &["people"]),
        ]
        .into_iter()
        .collect();
        let deps = schema.dependencies("people").unwrap();
        assert_eq!(
            deps,
            vec![
                Dependency {
                    column: "id".into(),
                    table: "missions".into(),
                    foreign_column: "ref0".into()
                },
                Dependency {
                    column: "id".into(),
                    table: "missions".into(),
                    foreign_column: "ref1".into()
                },
                Dependency {
                    column: "id".into(),
                    table: "notes".into(),
                    foreign_column: "ref0".into()
                },
            ]
        );
        assert!(schema.dependencies("missions").unwrap().is_empty());
        assert_eq!(
            schema.dependencies("ghosts").unwrap_err(),
            SchemaError::UnknownTable("ghosts".into())
        );
    }
}
