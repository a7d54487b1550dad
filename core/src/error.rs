//! Error types for schema metadata and record operations.
//!
//! Every failure in this crate is structural: it signals a schema or data
//! precondition violation, never a transient fault, so callers should abort
//! the enclosing operation rather than retry.

use thiserror::Error;

/// Errors raised by the metadata model, the graph operations and the
/// record identity model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// `sort_tables` could not make progress while tables remained unordered.
    #[error("reference cycle between tables: {}", remaining.join(", "))]
    SchemaCycle {
        /// Tables left unordered when the sort stalled.
        remaining: Vec<String>,
    },

    /// A reference string does not match the `table(column)` pattern.
    #[error("invalid reference '{0}': expected 'table(column)'")]
    InvalidReference(String),

    /// A unique-result lookup matched more than one row or property.
    #[error("ambiguous lookup for {what}: {count} matches")]
    AmbiguousLookup {
        /// Human-readable description of what was looked up.
        what: String,
        /// Number of matches found.
        count: usize,
    },

    /// A unique-result lookup matched nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A raw value cannot be coerced to the column's native type.
    #[error("cannot convert '{value}' to {expected} for column '{column}'")]
    TypeConversion {
        /// Column the value was meant for.
        column: String,
        /// Offending raw value, rendered as text.
        value: String,
        /// Native type that was expected.
        expected: String,
    },

    /// An operation requiring a complete natural key got a record without one.
    #[error("record in '{table}' has an incomplete natural key (missing {missing})")]
    IncompleteRecord {
        /// Table of the record.
        table: String,
        /// First missing key component.
        missing: String,
    },

    /// An index was built with unfilled column slots.
    #[error("index '{index}' has no column at slot {slot}")]
    IncompleteIndex {
        /// Index name.
        index: String,
        /// First empty slot.
        slot: usize,
    },

    /// A table name is not part of the schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A column name is not part of the table.
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn {
        /// Table that was searched.
        table: String,
        /// Column that was not found.
        column: String,
    },

    /// A column with the same name already exists in the table.
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn {
        /// Table being extended.
        table: String,
        /// Column name that collided.
        column: String,
    },

    /// The property kind is not declared by the record's kind.
    #[error("property kind '{kind}' is not declared for table '{table}'")]
    UnknownPropertyKind {
        /// Table of the owning record.
        table: String,
        /// Rejected kind.
        kind: String,
    },

    /// An unlimited traversal was requested over a reachable reference cycle.
    #[error("unbounded traversal from '{0}' reaches a reference cycle; pass a finite depth")]
    UnboundedTraversal(String),
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
