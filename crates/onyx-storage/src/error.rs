//! Storage error types.

use onyx_common::Rid;
use thiserror::Error;

/// Errors produced by the heap and index layers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record slot was addressed that holds no record.
    #[error("record not found at {0}")]
    RecordNotFound(Rid),

    /// A record buffer did not match the file's fixed record size.
    #[error("record size mismatch: expected {expected}, got {actual}")]
    RecordSizeMismatch {
        /// Record size declared by the file.
        expected: usize,
        /// Size of the buffer supplied by the caller.
        actual: usize,
    },

    /// An index key did not match the index's key length.
    #[error("key size mismatch: expected {expected}, got {actual}")]
    KeySizeMismatch {
        /// Key length declared by the index layout.
        expected: usize,
        /// Length of the key supplied by the caller.
        actual: usize,
    },

    /// An index entry to delete was not present.
    #[error("index key not found")]
    KeyNotFound,

    /// A persisted file image failed validation.
    #[error("corrupted storage file: {0}")]
    Corrupted(String),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
