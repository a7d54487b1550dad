//! Error types for SQLite adapter operations.
//!
//! [`SqliteError`] converts into [`DatabaseError`] at the adapter boundary;
//! constraint failures become [`DatabaseError::IntegrityViolation`] with the
//! engine's message unchanged.

use flightbook_core::SchemaError;
use flightbook_db::DatabaseError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A stored value has no counterpart in the value model.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Table, column or index name unsafe for DDL.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// The operation needs the table's id column.
    #[error("table '{0}' has no id column")]
    NoIdColumn(String),

    /// The adapter was used before `connect` or after `disconnect`.
    #[error("not connected")]
    NotConnected,

    /// Schema precondition violated.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Error raised by the store layer.
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

impl From<SqliteError> for DatabaseError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Store(inner) => inner,
            SqliteError::Schema(inner) => DatabaseError::Schema(inner),
            SqliteError::DatabaseError(rusqlite::Error::SqliteFailure(failure, message))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                DatabaseError::IntegrityViolation(
                    message.unwrap_or_else(|| failure.to_string()),
                )
            }
            other => DatabaseError::Backend(other.to_string()),
        }
    }
}
