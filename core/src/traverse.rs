//! Depth-bounded traversal of the foreign-key graph and the flattened join
//! plan built from it.
//!
//! [`SchemaIterator`] walks the columns of a root table depth first. A
//! foreign-key column is expanded into the columns of the table it
//! references while the depth budget lasts; every other column (and every
//! foreign key once the budget is spent) is yielded as a [`JoinLeaf`].
//!
//! Each table reached through a chain of foreign keys gets an alias made of
//! the column names along the chain plus the table name, so the same table
//! reached twice (say `people` via `pilot` and via `copilot`) is joined twice
//! under `pilot.people` and `copilot.people`.
//!
//! Self-referencing tables recurse until the budget is exhausted. An
//! unlimited budget is therefore refused whenever a reference cycle is
//! reachable from the root.
//!
//! # Examples
//!
//! ```
//! use flightbook_core::{flightlog, Depth, JoinPlan};
//!
//! let schema = flightlog::schema();
//! let plan = JoinPlan::build(&schema, "person_properties", Depth::Limited(1)).unwrap();
//! assert!(plan.shape().index_of("person.last_name").is_some());
//! assert_eq!(plan.joins()[0].alias, "person.people");
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::column::ColumnInfo;
use crate::error::{Result, SchemaError};
use crate::row::RowShape;
use crate::schema::Schema;
use crate::table::TableInfo;

/// Remaining number of foreign-key hops a traversal may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// At most this many hops.
    Limited(usize),
    /// No limit. Only accepted for acyclic reference graphs.
    Unlimited,
}

impl Depth {
    /// Maps a signed budget where any negative value means unlimited.
    pub fn from_budget(budget: i64) -> Self {
        usize::try_from(budget).map_or(Depth::Unlimited, Depth::Limited)
    }

    fn can_descend(self) -> bool {
        !matches!(self, Depth::Limited(0))
    }

    fn descend(self) -> Self {
        match self {
            Depth::Limited(n) => Depth::Limited(n.saturating_sub(1)),
            Depth::Unlimited => Depth::Unlimited,
        }
    }
}

/// One step of a traversal: a table and one of its columns.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub table: &'a TableInfo,
    pub column: &'a ColumnInfo,
}

/// Equality between a referencing column and the referenced column, both
/// qualified by table alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPredicate {
    pub left_alias: String,
    pub left_column: String,
    pub right_alias: String,
    pub right_column: String,
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = {}.{}",
            quote_ident(&self.left_alias),
            quote_ident(&self.left_column),
            quote_ident(&self.right_alias),
            quote_ident(&self.right_column)
        )
    }
}

/// A column reached by the traversal, with the chain of frames leading to it.
#[derive(Debug, Clone)]
pub struct JoinLeaf<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> JoinLeaf<'a> {
    /// Frames from the root to this leaf; the last one holds the leaf column.
    pub fn frames(&self) -> &[Frame<'a>] {
        &self.frames
    }

    pub fn table(&self) -> &'a TableInfo {
        self.leaf().table
    }

    pub fn column(&self) -> &'a ColumnInfo {
        self.leaf().column
    }

    /// Dotted column names from the root to the leaf, e.g. `pilot.last_name`.
    pub fn path(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.column.name())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Unique alias of the leaf's table.
    pub fn alias(&self) -> String {
        self.alias_at(self.frames.len() - 1)
    }

    /// The join that pulls this leaf's table into the result, or `None`
    /// for columns of the root table.
    pub fn parent_join(&self) -> Option<JoinPredicate> {
        self.join_at(self.frames.len() - 1)
    }

    fn leaf(&self) -> &Frame<'a> {
        &self.frames[self.frames.len() - 1]
    }

    fn alias_at(&self, i: usize) -> String {
        let table = self.frames[i].table.name();
        if i == 0 {
            return table.to_string();
        }
        let mut parts: Vec<&str> = self.frames[..i].iter().map(|f| f.column.name()).collect();
        parts.push(table);
        parts.join(".")
    }

    fn join_at(&self, i: usize) -> Option<JoinPredicate> {
        if i == 0 {
            return None;
        }
        let parent = &self.frames[i - 1];
        let reference = parent.column.reference()?;
        Some(JoinPredicate {
            left_alias: self.alias_at(i - 1),
            left_column: parent.column.name().to_string(),
            right_alias: self.alias_at(i),
            right_column: reference.column.clone(),
        })
    }
}

#[derive(Debug)]
struct Cursor<'a> {
    table: &'a TableInfo,
    next: usize,
    depth: Depth,
}

/// Depth-first iterator over the leaves reachable from a root table.
///
/// With [`Depth::Limited`]`(n)` no leaf has more than `n + 1` frames.
#[derive(Debug)]
pub struct SchemaIterator<'a> {
    schema: &'a Schema,
    stack: Vec<Cursor<'a>>,
    via: Vec<&'a ColumnInfo>,
}

impl<'a> SchemaIterator<'a> {
    /// Starts a traversal at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTable`] for an unknown root, and
    /// [`SchemaError::UnboundedTraversal`] for [`Depth::Unlimited`] when a
    /// reference cycle (a self-reference included) is reachable from the
    /// root.
    pub fn new(schema: &'a Schema, root: &str, depth: Depth) -> Result<Self> {
        let table = schema.table(root)?;
        if depth == Depth::Unlimited && reaches_cycle(schema, root) {
            return Err(SchemaError::UnboundedTraversal(root.to_string()));
        }
        Ok(Self {
            schema,
            stack: vec![Cursor {
                table,
                next: 0,
                depth,
            }],
            via: Vec::new(),
        })
    }
}

impl<'a> Iterator for SchemaIterator<'a> {
    type Item = JoinLeaf<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let (table, depth) = (top.table, top.depth);
            let Some(column) = table.columns().get(top.next) else {
                self.stack.pop();
                self.via.pop();
                continue;
            };
            top.next += 1;

            let target = match column.reference() {
                Some(reference) if depth.can_descend() => self.schema.get(&reference.table),
                _ => None,
            };
            if let Some(target) = target {
                self.via.push(column);
                self.stack.push(Cursor {
                    table: target,
                    next: 0,
                    depth: depth.descend(),
                });
                continue;
            }

            let mut frames: Vec<Frame<'a>> = self
                .stack
                .iter()
                .zip(self.via.iter())
                .map(|(cursor, column)| Frame {
                    table: cursor.table,
                    column: *column,
                })
                .collect();
            frames.push(Frame { table, column });
            return Some(JoinLeaf { frames });
        }
    }
}

/// Whether a reference cycle is reachable from `root`.
fn reaches_cycle(schema: &Schema, root: &str) -> bool {
    fn visit<'s>(
        schema: &'s Schema,
        name: &'s str,
        on_path: &mut HashSet<&'s str>,
        finished: &mut HashSet<&'s str>,
    ) -> bool {
        if finished.contains(name) {
            return false;
        }
        if !on_path.insert(name) {
            return true;
        }
        if let Some(table) = schema.get(name) {
            for (_, reference) in table.references() {
                if schema.contains(&reference.table)
                    && visit(schema, &reference.table, on_path, finished)
                {
                    return true;
                }
            }
        }
        on_path.remove(name);
        finished.insert(name);
        false
    }

    visit(schema, root, &mut HashSet::new(), &mut HashSet::new())
}

/// One output column of a [`JoinPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanField {
    /// Alias of the table the column is read from.
    pub alias: String,
    /// Column name in that table.
    pub column: String,
    /// Dotted path, used as the output field name.
    pub path: String,
}

/// One `LEFT JOIN` of a [`JoinPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanJoin {
    pub table: String,
    pub alias: String,
    pub on: JoinPredicate,
}

/// A single-query plan that materializes a root table with the rows its
/// foreign keys point to, flattened into dotted field names.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    root: String,
    fields: Vec<PlanField>,
    joins: Vec<PlanJoin>,
    shape: Arc<RowShape>,
}

impl JoinPlan {
    /// Collects the leaves of a traversal into fields and deduplicated joins.
    ///
    /// Joins appear parents first, in traversal order.
    pub fn build(schema: &Schema, root: &str, depth: Depth) -> Result<Self> {
        let mut fields = Vec::new();
        let mut joins: Vec<PlanJoin> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for leaf in SchemaIterator::new(schema, root, depth)? {
            for i in 1..leaf.frames().len() {
                let alias = leaf.alias_at(i);
                if !seen.insert(alias.clone()) {
                    continue;
                }
                if let Some(on) = leaf.join_at(i) {
                    joins.push(PlanJoin {
                        table: leaf.frames()[i].table.name().to_string(),
                        alias,
                        on,
                    });
                }
            }
            fields.push(PlanField {
                alias: leaf.alias(),
                column: leaf.column().name().to_string(),
                path: leaf.path(),
            });
        }

        let shape = Arc::new(RowShape::new(fields.iter().map(|f| f.path.clone()).collect()));
        Ok(Self {
            root: root.to_string(),
            fields,
            joins,
            shape,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn fields(&self) -> &[PlanField] {
        &self.fields
    }

    pub fn joins(&self) -> &[PlanJoin] {
        &self.joins
    }

    /// Row shape of the plan's result, one field per leaf path.
    pub fn shape(&self) -> Arc<RowShape> {
        Arc::clone(&self.shape)
    }

    /// Renders the `SELECT ... FROM ... LEFT JOIN ...` statement.
    pub fn select_sql(&self) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|f| {
                format!(
                    "{}.{} AS {}",
                    quote_ident(&f.alias),
                    quote_ident(&f.column),
                    quote_ident(&f.path)
                )
            })
            .collect();
        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            columns.join(", "),
            quote_ident(&self.root),
            quote_ident(&self.root)
        );
        for join in &self.joins {
            sql.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}",
                quote_ident(&join.table),
                quote_ident(&join.alias),
                join.on
            ));
        }
        sql
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
