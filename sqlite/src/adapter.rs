//! The SQLite implementation of [`Adapter`].
//!
//! # Example
//!
//! ```
//! use flightbook_core::flightlog;
//! use flightbook_db::{Store, StoreConfig};
//! use flightbook_sqlite::SqliteAdapter;
//!
//! let mut store = Store::open(
//!     SqliteAdapter::new(),
//!     StoreConfig::new(":memory:"),
//!     Some(flightlog::schema()),
//! )
//! .unwrap();
//! store.create_schema(false).unwrap();
//! assert_eq!(store.count("people", None, &[]).unwrap(), 0);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use flightbook_core::{
    ColumnInfo, IndexInfo, Placeholder, Reference, Row, RowShape, Schema, SchemaError, SortOrder,
    TableInfo, Value, quote_ident,
};
use flightbook_db::{Adapter, Store, StoreConfig};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::{debug, warn};

use crate::convert::{read_row, to_sql};
use crate::error::{Result, SqliteError};
use crate::schema::{create_index_sql, create_table_sql, validate_identifier};

/// Identifier opening a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// SQLite [`Adapter`]; the connection closes on [`disconnect`] or drop.
///
/// [`disconnect`]: Adapter::disconnect
#[derive(Debug, Default)]
pub struct SqliteAdapter {
    conn: Option<Connection>,
}

impl SqliteAdapter {
    /// An unconnected adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already open connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn: Some(conn) })
    }

    /// The open connection.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(SqliteError::NotConnected)
    }

    fn open(&mut self, identifier: &str) -> Result<()> {
        let conn = if identifier == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(identifier)?
        };
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn = Some(conn);
        debug!(identifier, "connected");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| SqliteError::from(e))?;
            debug!("disconnected");
        }
        Ok(())
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!(sql, params = params.len(), "execute");
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter().map(to_sql)))?)
    }

    fn fetch(&self, sql: &str, params: &[Value], shape: Arc<RowShape>) -> Result<Vec<Row>> {
        debug!(sql, params = params.len(), "query");
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let width = shape.len();
        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Row::new(Arc::clone(&shape), read_row(row, width)?));
        }
        Ok(out)
    }

    fn table_names(&self) -> Result<BTreeSet<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
    }

    /// Rebuilds a [`TableInfo`] from the catalog.
    ///
    /// Primary keys come back as an index named `pk_{table}`; declared
    /// `AUTOINCREMENT` is restored on the id column. Parser flags such as
    /// null-if-falsy are not stored by SQLite and come back unset.
    fn introspect(&self, name: &str) -> Result<TableInfo> {
        validate_identifier(name)?;
        let conn = self.connection()?;
        let quoted = quote_ident(name);

        let create_sql: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(create_sql) = create_sql else {
            return Err(SchemaError::UnknownTable(name.to_string()).into());
        };
        let autoincrement = create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");

        let mut references: BTreeMap<String, Reference> = BTreeMap::new();
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({quoted})"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let table: String = row.get("table")?;
            let from: String = row.get("from")?;
            let to: Option<String> = row.get("to")?;
            references.insert(from, Reference::new(table, to.unwrap_or_else(|| "id".into())));
        }

        let mut pk: Vec<(i64, String)> = Vec::new();
        let mut columns = Vec::new();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted})"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let column_name: String = row.get("name")?;
            let data_type: String = row.get("type")?;
            let not_null: bool = row.get("notnull")?;
            let default: Option<String> = row.get("dflt_value")?;
            let pk_slot: i64 = row.get("pk")?;

            let mut column = ColumnInfo::new(&column_name, data_type).with_nullable(!not_null);
            if let Some(default) = default {
                column = column.with_default(unquote_default(&default));
            }
            if let Some(reference) = references.remove(&column_name) {
                column = column.with_reference(reference);
            }
            if pk_slot > 0 {
                pk.push((pk_slot, column_name));
            }
            columns.push(column);
        }

        pk.sort();
        if let [(_, id)] = pk.as_slice() {
            if autoincrement {
                for column in &mut columns {
                    if column.name() == id {
                        *column = column.clone().with_extra("AUTOINCREMENT");
                    }
                }
            }
        }

        let mut table = TableInfo::with_columns(name, columns)?;
        if !pk.is_empty() {
            let builder = pk
                .iter()
                .fold(IndexInfo::builder(format!("pk_{name}")).primary(true), |b, (_, c)| {
                    b.add_column(c, SortOrder::Asc, None)
                });
            table.add_index(builder.build()?);
        }

        let mut stmt = conn.prepare(&format!("PRAGMA index_list({quoted})"))?;
        let indices = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>("name")?,
                    row.get::<_, bool>("unique")?,
                    row.get::<_, String>("origin")?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (index_name, unique, origin) in indices {
            if origin == "pk" {
                continue;
            }
            let mut builder = IndexInfo::builder(&index_name).unique(unique);
            let mut stmt = conn.prepare(&format!("PRAGMA index_xinfo({})", quote_ident(&index_name)))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let key: bool = row.get("key")?;
                let column: Option<String> = row.get("name")?;
                let (true, Some(column)) = (key, column) else {
                    continue;
                };
                let seq: i64 = row.get("seqno")?;
                let order = if row.get::<_, bool>("desc")? {
                    SortOrder::Desc
                } else {
                    SortOrder::Asc
                };
                builder = builder.add_column(column, order, usize::try_from(seq).ok());
            }
            table.add_index(builder.build()?);
        }

        Ok(table)
    }

    fn create(&mut self, table: &TableInfo, force: bool) -> Result<()> {
        let conn = self.connection()?;
        let sql = create_table_sql(table)?;
        if force {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(table.name())))?;
        }
        conn.execute_batch(&sql)?;
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: &[Row], force: bool) -> Result<usize> {
        validate_identifier(table)?;
        let verb = if force {
            "INSERT OR REPLACE"
        } else {
            "INSERT OR IGNORE"
        };
        let placeholder = Placeholder::positional();
        let mut written = 0;
        for row in rows {
            let fields = row.shape().fields();
            let columns: Vec<String> = fields.iter().map(|f| quote_ident(f)).collect();
            let sql = format!(
                "{verb} INTO {} ({}) VALUES {}",
                quote_ident(table),
                columns.join(", "),
                placeholder.tuple(fields.iter().map(String::as_str))
            );
            written += self.execute(&sql, row.values())?;
        }
        Ok(written)
    }

    fn max_id_of(&self, table: &TableInfo) -> Result<Option<i64>> {
        let id = table
            .id_column()
            .ok_or_else(|| SqliteError::NoIdColumn(table.name().to_string()))?;
        let sql = format!(
            "SELECT MAX({}) FROM {}",
            quote_ident(id.name()),
            quote_ident(table.name())
        );
        let max: Option<i64> = self.connection()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(max)
    }
}

impl Drop for SqliteAdapter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "closing connection failed");
        }
    }
}

fn with_clauses(mut sql: String, filter: Option<&str>, order: Option<&str>) -> String {
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if let Some(order) = order {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    sql
}

/// Default values come back as SQL literals.
fn unquote_default(literal: &str) -> String {
    literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map_or_else(|| literal.to_string(), |s| s.replace("''", "'"))
}

impl Adapter for SqliteAdapter {
    fn connect(&mut self, identifier: &str, _schema: Option<&Schema>) -> flightbook_db::Result<()> {
        self.close()?;
        Ok(self.open(identifier)?)
    }

    fn disconnect(&mut self) -> flightbook_db::Result<()> {
        Ok(self.close()?)
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::positional()
    }

    fn list_tables(&self) -> flightbook_db::Result<BTreeSet<String>> {
        Ok(self.table_names()?)
    }

    fn get_table_info(&self, name: &str) -> flightbook_db::Result<TableInfo> {
        Ok(self.introspect(name)?)
    }

    fn create_table(&mut self, table: &TableInfo, force: bool) -> flightbook_db::Result<()> {
        Ok(self.create(table, force)?)
    }

    fn create_index(&mut self, table: &str, index: &IndexInfo) -> flightbook_db::Result<()> {
        let sql = create_index_sql(table, index)?;
        self.execute(&sql, &[])?;
        Ok(())
    }

    fn select(
        &self,
        table: &TableInfo,
        filter: Option<&str>,
        order: Option<&str>,
        params: &[Value],
    ) -> flightbook_db::Result<Vec<Row>> {
        let columns: Vec<String> = table.column_names().map(quote_ident).collect();
        let sql = with_clauses(
            format!(
                "SELECT {} FROM {}",
                columns.join(", "),
                quote_ident(table.name())
            ),
            filter,
            order,
        );
        Ok(self.fetch(&sql, params, table.row_shape())?)
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
        shape: Arc<RowShape>,
    ) -> flightbook_db::Result<Vec<Row>> {
        Ok(self.fetch(sql, params, shape)?)
    }

    fn insert(&mut self, table: &str, rows: &[Row], force: bool) -> flightbook_db::Result<usize> {
        Ok(self.insert_rows(table, rows, force)?)
    }

    fn update(
        &mut self,
        table: &str,
        assignment: &str,
        filter: Option<&str>,
        params: &[Value],
    ) -> flightbook_db::Result<usize> {
        let sql = with_clauses(
            format!("UPDATE {} SET {assignment}", quote_ident(table)),
            filter,
            None,
        );
        Ok(self.execute(&sql, params)?)
    }

    fn delete(
        &mut self,
        table: &str,
        filter: Option<&str>,
        params: &[Value],
    ) -> flightbook_db::Result<usize> {
        let sql = with_clauses(format!("DELETE FROM {}", quote_ident(table)), filter, None);
        Ok(self.execute(&sql, params)?)
    }

    fn count(
        &self,
        table: &str,
        filter: Option<&str>,
        params: &[Value],
    ) -> flightbook_db::Result<u64> {
        let sql = with_clauses(
            format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            filter,
            None,
        );
        let shape = Arc::new(RowShape::new(vec!["count".into()]));
        let rows = self.fetch(&sql, params, shape)?;
        let count = rows
            .first()
            .and_then(|row| row.values()[0].as_i64())
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn last_insert_id(&self) -> flightbook_db::Result<Option<i64>> {
        let rowid = self.connection()?.last_insert_rowid();
        Ok((rowid != 0).then_some(rowid))
    }

    fn max_id(&self, table: &TableInfo) -> flightbook_db::Result<Option<i64>> {
        Ok(self.max_id_of(table)?)
    }

    fn begin(&mut self) -> flightbook_db::Result<()> {
        self.execute("BEGIN", &[])?;
        Ok(())
    }

    fn commit(&mut self) -> flightbook_db::Result<()> {
        self.execute("COMMIT", &[])?;
        Ok(())
    }

    fn rollback(&mut self) -> flightbook_db::Result<()> {
        self.execute("ROLLBACK", &[])?;
        Ok(())
    }
}

/// Guard deleting a database file unless disarmed.
struct RemoveOnFailure<'a> {
    path: &'a Path,
    armed: bool,
}

impl Drop for RemoveOnFailure<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partially created store"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "cleanup failed"),
        }
    }
}

/// Creates a new database file at `config.database` holding `schema`.
///
/// Tables are created inside one transaction. If anything fails, the
/// connection is closed and the file is deleted again; an existing file is
/// never deleted.
///
/// # Errors
///
/// Fails on invalid configuration, cyclic schemas, unsafe identifiers and
/// any SQLite error.
pub fn create_store(config: StoreConfig, schema: Schema) -> flightbook_db::Result<Store<SqliteAdapter>> {
    let database = config.database.clone();
    let path = Path::new(&database);
    let mut guard = RemoveOnFailure {
        path,
        armed: database != IN_MEMORY && !path.exists(),
    };

    let mut store = Store::open(SqliteAdapter::new(), config, Some(schema))?;
    if let Err(err) = store.atomically(|s| s.create_schema(false)) {
        drop(store);
        return Err(err);
    }

    guard.armed = false;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightbook_core::flightlog;
    use flightbook_db::DatabaseError;

    fn connected() -> SqliteAdapter {
        let mut adapter = SqliteAdapter::new();
        adapter.connect(IN_MEMORY, None).unwrap();
        adapter
    }

    #[test]
    fn test_not_connected() {
        let adapter = SqliteAdapter::new();
        assert!(matches!(
            adapter.list_tables(),
            Err(DatabaseError::Backend(_))
        ));
    }

    #[test]
    fn test_introspection_round_trip() {
        let schema = flightlog::schema();
        let mut adapter = connected();
        for table in schema.sorted_tables().unwrap() {
            adapter.create_table(table, false).unwrap();
            for index in table.indices().into_iter().filter(|i| !i.is_primary()) {
                adapter.create_index(table.name(), index).unwrap();
            }
        }

        let names = adapter.list_tables().unwrap();
        assert_eq!(
            names.iter().map(String::as_str).collect::<Vec<_>>(),
            ["missions", "people", "person_properties", "vehicles"]
        );

        let people = adapter.get_table_info("people").unwrap();
        let expected = schema.table("people").unwrap();
        assert_eq!(people.column_names().collect::<Vec<_>>(), expected.column_names().collect::<Vec<_>>());
        assert!(people.id_column().unwrap().is_auto_increment());
        assert_eq!(people.column("count").unwrap().default(), Some("0"));
        assert!(!people.column("last_name").unwrap().is_nullable());
        let index = people.index("people_name").unwrap();
        assert!(index.is_unique());
        assert_eq!(index.key_format(), "(last_name ASC, first_name ASC, count ASC)");

        let missions = adapter.get_table_info("missions").unwrap();
        assert_eq!(
            missions.column("launch").unwrap().reference(),
            Some(&Reference::new("missions", "id"))
        );
        assert_eq!(missions.get_references(), schema.table("missions").unwrap().get_references());
    }

    #[test]
    fn test_unknown_table_introspection() {
        let adapter = connected();
        assert!(matches!(
            adapter.get_table_info("hangars"),
            Err(DatabaseError::Schema(_))
        ));
    }

    #[test]
    fn test_insert_or_ignore_and_replace() {
        let schema = flightlog::schema();
        let vehicles = schema.table("vehicles").unwrap();
        let mut adapter = connected();
        adapter.create_table(vehicles, false).unwrap();
        adapter
            .create_index("vehicles", vehicles.index("vehicles_registration").unwrap())
            .unwrap();

        let shape = Arc::new(RowShape::new(vec!["registration".into(), "model".into()]));
        let row = |model: &str| {
            Row::new(
                Arc::clone(&shape),
                vec![Value::from("D-KXYZ"), Value::from(model)],
            )
        };
        assert_eq!(adapter.insert("vehicles", &[row("Ka 8")], false).unwrap(), 1);
        assert_eq!(adapter.insert("vehicles", &[row("Ka 6")], false).unwrap(), 0);
        assert_eq!(adapter.insert("vehicles", &[row("Ka 6")], true).unwrap(), 1);

        let rows = adapter.select(vehicles, None, None, &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("model"), Some(&Value::from("Ka 6")));
        assert_eq!(adapter.max_id(vehicles).unwrap(), Some(2));
    }

    #[test]
    fn test_max_id_of_empty_table() {
        let schema = flightlog::schema();
        let vehicles = schema.table("vehicles").unwrap();
        let mut adapter = connected();
        adapter.create_table(vehicles, false).unwrap();
        assert_eq!(adapter.max_id(vehicles).unwrap(), None);
    }

    #[test]
    fn test_unquote_default() {
        assert_eq!(unquote_default("'it''s'"), "it's");
        assert_eq!(unquote_default("0"), "0");
        assert_eq!(unquote_default("CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
    }
}
