//! Error types for store operations.
//!
//! Schema-level failures from `flightbook-core` are wrapped unchanged;
//! adapters report their own failures either as integrity violations,
//! which carry the engine's message verbatim, or as generic backend errors.

use flightbook_core::SchemaError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Schema or record precondition violated.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Constraint failure reported by the storage engine.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Any other storage engine failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration rejected on load.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
