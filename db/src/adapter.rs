//! The contract a storage engine fulfils for the [`Store`](crate::Store).
//!
//! Filters and orderings are SQL fragments supplied by the caller. Their
//! parameters are passed separately and bind in order of appearance, so a
//! fragment built with [`Adapter::placeholder`] works for positional and
//! named placeholder styles alike.

use std::collections::BTreeSet;
use std::sync::Arc;

use flightbook_core::{IndexInfo, Placeholder, Row, RowShape, Schema, TableInfo, Value};

use crate::error::Result;

/// Storage engine operations consumed by the store.
///
/// Calls are synchronous and may block on I/O. No call opens or closes a
/// transaction implicitly; [`begin`](Self::begin),
/// [`commit`](Self::commit) and [`rollback`](Self::rollback) are the only
/// transaction boundaries.
pub trait Adapter {
    /// Opens the connection. The schema, when given, describes the tables
    /// the caller expects; adapters may use it to prepare their state.
    fn connect(&mut self, identifier: &str, schema: Option<&Schema>) -> Result<()>;

    /// Closes the connection. Closing twice is not an error.
    fn disconnect(&mut self) -> Result<()>;

    /// Parameter marker style of the engine.
    fn placeholder(&self) -> Placeholder;

    /// Names of the existing tables.
    fn list_tables(&self) -> Result<BTreeSet<String>>;

    /// Introspects one existing table.
    fn get_table_info(&self, name: &str) -> Result<TableInfo>;

    /// Creates a table; with `force` an existing table is dropped first.
    fn create_table(&mut self, table: &TableInfo, force: bool) -> Result<()>;

    fn create_index(&mut self, table: &str, index: &IndexInfo) -> Result<()>;

    /// Selects the columns of `table` in column order, shaped by
    /// [`TableInfo::row_shape`].
    fn select(
        &self,
        table: &TableInfo,
        filter: Option<&str>,
        order: Option<&str>,
        params: &[Value],
    ) -> Result<Vec<Row>>;

    /// Runs an arbitrary read statement, shaping its result by `shape`.
    fn query(&self, sql: &str, params: &[Value], shape: Arc<RowShape>) -> Result<Vec<Row>>;

    /// Inserts rows, naming columns by each row's shape. With `force`
    /// conflicting rows are replaced, otherwise they are silently ignored.
    /// Returns the number of rows written.
    fn insert(&mut self, table: &str, rows: &[Row], force: bool) -> Result<usize>;

    /// Applies `assignment` (e.g. `"pilot" = ?`) to the matching rows.
    /// Parameters of the assignment come before those of the filter.
    fn update(
        &mut self,
        table: &str,
        assignment: &str,
        filter: Option<&str>,
        params: &[Value],
    ) -> Result<usize>;

    fn delete(&mut self, table: &str, filter: Option<&str>, params: &[Value]) -> Result<usize>;

    fn count(&self, table: &str, filter: Option<&str>, params: &[Value]) -> Result<u64>;

    /// Id the engine assigned to the last row an [`insert`](Self::insert)
    /// on this connection actually wrote. Only meaningful right after an
    /// insert that reported written rows.
    fn last_insert_id(&self) -> Result<Option<i64>>;

    /// Largest id of the table's id column, `None` when the table is empty.
    fn max_id(&self, table: &TableInfo) -> Result<Option<i64>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}
