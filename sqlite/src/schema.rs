//! SQL generation from table metadata.
//!
//! The id column is rendered inline as `INTEGER PRIMARY KEY` so that it
//! aliases SQLite's rowid; any other primary index becomes a table
//! constraint. Secondary indices are created separately, see
//! [`create_index_sql`].

use flightbook_core::{ColumnInfo, IndexInfo, Schema, TableInfo, quote_ident};

use crate::error::{Result, SqliteError};

/// Validates that a name contains only alphanumeric characters and underscores.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validates every table, column and index name of `table`.
pub(crate) fn validate_table(table: &TableInfo) -> Result<()> {
    validate_identifier(table.name())?;
    for name in table.column_names() {
        validate_identifier(name)?;
    }
    for index in table.indices() {
        validate_identifier(index.name())?;
    }
    Ok(())
}

fn column_sql(column: &ColumnInfo, is_id: bool) -> String {
    let mut parts = vec![quote_ident(column.name()), column.data_type().to_string()];
    if is_id {
        parts.push("PRIMARY KEY".into());
        if column.is_auto_increment() {
            parts.push("AUTOINCREMENT".into());
        }
    } else if let Some(extra) = column.extra() {
        parts.push(extra.to_string());
    }
    if !column.is_nullable() {
        parts.push("NOT NULL".into());
    }
    let default = column.default_sql();
    if !default.is_empty() {
        parts.push(default);
    }
    if let Some(reference) = column.reference_sql() {
        parts.push(reference);
    }
    parts.join(" ")
}

/// `CREATE TABLE IF NOT EXISTS` statement for `table`.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidIdentifier`] for unsafe names.
pub fn create_table_sql(table: &TableInfo) -> Result<String> {
    validate_table(table)?;
    let id = table.id_column().map(|c| c.name());
    let mut lines: Vec<String> = table
        .columns()
        .iter()
        .map(|c| column_sql(c, Some(c.name()) == id))
        .collect();
    if id.is_none() {
        let key = table.primary_key();
        if !key.is_empty() {
            lines.push(key);
        }
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table.name()),
        lines.join(",\n    ")
    ))
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS` statement.
pub fn create_index_sql(table: &str, index: &IndexInfo) -> Result<String> {
    validate_identifier(table)?;
    validate_identifier(index.name())?;
    Ok(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} {}",
        if index.is_unique() { "UNIQUE " } else { "" },
        quote_ident(index.name()),
        quote_ident(table),
        index.key_format()
    ))
}

/// Complete DDL for `schema`: tables in dependency order, each followed by
/// its secondary indices.
pub fn generate_schema_sql(schema: &Schema) -> Result<String> {
    let mut statements = Vec::new();
    for table in schema.sorted_tables()? {
        statements.push(create_table_sql(table)?);
        for index in table.indices().into_iter().filter(|i| !i.is_primary()) {
            statements.push(create_index_sql(table.name(), index)?);
        }
    }
    Ok(statements.join(";\n") + ";\n")
}

/// Drops the tables of `schema`, dependents first.
pub fn generate_drop_sql(schema: &Schema) -> Result<String> {
    let ordered = schema.sorted_tables()?;
    let mut sql = String::new();
    for table in ordered.into_iter().rev() {
        validate_identifier(table.name())?;
        sql.push_str(&format!("DROP TABLE IF EXISTS {};\n", quote_ident(table.name())));
    }
    Ok(sql)
}
