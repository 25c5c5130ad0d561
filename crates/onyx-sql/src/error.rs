//! Query pipeline error types.
//!
//! Every failure in analysis, planning, or execution surfaces as a
//! [`QueryError`]. Display strings are stable and short; they are what a
//! client sees at the statement boundary.

use onyx_storage::StorageError;
use onyx_txn::TxnError;
use thiserror::Error;

/// Errors produced by the statement pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A referenced table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A table to create already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// A referenced column does not exist.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// An unqualified column name matched more than one table.
    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),

    /// CREATE TABLE declared the same column twice.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// Two table references share an alias, or an alias collides with an
    /// existing distinct mapping.
    #[error("duplicate alias: {0}")]
    DuplicateAlias(String),

    /// A value could not be coerced to the required column type.
    #[error("incompatible types: {lhs} and {rhs}")]
    IncompatibleType {
        /// Type on the left-hand side of the coercion.
        lhs: String,
        /// Type on the right-hand side of the coercion.
        rhs: String,
    },

    /// A string literal does not fit the target column.
    #[error("string of length {len} exceeds column width {width}")]
    StringOverflow {
        /// Length of the literal.
        len: usize,
        /// Declared column width.
        width: usize,
    },

    /// INSERT supplied the wrong number of values.
    #[error("invalid value count")]
    InvalidValueCount,

    /// A referenced index does not exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// An index to create already exists.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// No join algorithm is enabled.
    #[error("no join algorithm enabled")]
    NoJoinAlgorithm,

    /// Index maintenance failed mid-statement; local changes were rolled
    /// back per the executor's compensation rules.
    #[error("index update failed: {0}")]
    IndexUpdateFailed(String),

    /// The catalog image could not be read or written.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// An invariant was violated — this indicates a bug.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error from the file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error propagated from the storage layer.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error propagated from the lock or transaction layer.
    #[error("transaction error: {0}")]
    Txn(#[from] TxnError),
}

/// Result alias for pipeline operations.
pub type QueryResult<T> = Result<T, QueryError>;
