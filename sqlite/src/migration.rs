//! Migration lifecycle operations for a [`Schema`].
//!
//! Provides [`Migration`] for creating, dropping and refreshing the tables
//! of a schema on a bare connection. All mutation operations use
//! transactions, so a failing statement leaves the database as it was.
//!
//! # Example
//!
//! ```
//! use flightbook_core::flightlog;
//! use flightbook_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let mut migration = Migration::new(conn, flightlog::schema()).unwrap();
//!
//! migration.up().unwrap();
//! let status = migration.status().unwrap();
//! assert!(status.tables_exist);
//! assert_eq!(status.row_counts["missions"], 0);
//! ```

use std::collections::BTreeMap;

use flightbook_core::{Schema, quote_ident};
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, validate_table};

/// Manages the tables of one [`Schema`] on a connection.
pub struct Migration {
    conn: Connection,
    schema: Schema,
}

impl Migration {
    /// Creates a migration manager for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidIdentifier`] if any table, column or
    /// index name is unsafe for DDL.
    pub fn new(conn: Connection, schema: Schema) -> Result<Self> {
        for table in schema.tables() {
            validate_table(table)?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, schema })
    }

    /// Creates all tables and secondary indices in dependency order.
    ///
    /// Uses `IF NOT EXISTS`, so it is safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Fails with [`SqliteError::Schema`] on a cyclic schema and with
    /// [`SqliteError::MigrationError`] when a statement is rejected.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.schema)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        info!(tables = self.schema.len(), "schema created");
        Ok(())
    }

    /// Drops all tables, dependents first.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.schema)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        info!(tables = self.schema.len(), "schema dropped");
        Ok(())
    }

    /// Drops and recreates every table.
    pub fn refresh(&mut self) -> Result<()> {
        self.down()?;
        self.up()
    }

    /// Reports which tables exist and how many rows each holds.
    pub fn status(&self) -> Result<MigrationStatus> {
        let mut missing = Vec::new();
        let mut row_counts = BTreeMap::new();
        for name in self.schema.table_names() {
            if self.table_exists(name)? {
                row_counts.insert(name.to_string(), self.count_rows(name)?);
            } else {
                missing.push(name.to_string());
            }
        }
        Ok(MigrationStatus {
            tables_exist: missing.is_empty(),
            missing,
            row_counts,
        })
    }

    /// The managed schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
        let count: i64 = stmt.query_row([name], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Snapshot returned by [`Migration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Whether every table of the schema exists.
    pub tables_exist: bool,
    /// Tables of the schema not present in the database.
    pub missing: Vec<String>,
    /// Row count per existing table.
    pub row_counts: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightbook_core::{ColumnInfo, TableInfo, flightlog};

    fn migration() -> Migration {
        let conn = Connection::open_in_memory().unwrap();
        Migration::new(conn, flightlog::schema()).unwrap()
    }

    #[test]
    fn test_migration_new_validates_identifiers() {
        let mut table = TableInfo::new("hangars");
        table
            .add_column(ColumnInfo::new("door;--", "TEXT"))
            .unwrap();
        let schema: Schema = [table].into_iter().collect();
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            Migration::new(conn, schema),
            Err(SqliteError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_status_on_empty_database() {
        let status = migration().status().unwrap();
        assert!(!status.tables_exist);
        assert_eq!(status.missing.len(), 4);
        assert!(status.row_counts.is_empty());
    }

    #[test]
    fn test_up_and_status() {
        let mut migration = migration();
        migration.up().unwrap();
        let status = migration.status().unwrap();
        assert!(status.tables_exist);
        assert!(status.missing.is_empty());
        assert_eq!(status.row_counts.len(), 4);
        assert!(status.row_counts.values().all(|&n| n == 0));
    }

    #[test]
    fn test_up_is_idempotent() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.up().unwrap();
        assert!(migration.status().unwrap().tables_exist);
    }

    #[test]
    fn test_down_removes_tables() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.down().unwrap();
        assert_eq!(migration.status().unwrap().missing.len(), 4);
    }

    #[test]
    fn test_down_is_idempotent() {
        migration().down().unwrap();
    }

    #[test]
    fn test_refresh_empties_tables() {
        let mut migration = migration();
        migration.up().unwrap();
        migration
            .connection()
            .execute(
                "INSERT INTO vehicles (registration) VALUES ('D-KXYZ')",
                [],
            )
            .unwrap();
        assert_eq!(migration.status().unwrap().row_counts["vehicles"], 1);

        migration.refresh().unwrap();
        assert_eq!(migration.status().unwrap().row_counts["vehicles"], 0);
    }
}
