//! Table-level lock management.
//!
//! Locks are held per heap file id in shared (S) or exclusive (X) mode.
//!
//! # Lock Compatibility Matrix
//!
//! ```text
//!          │ S  │ X  │
//! ─────────┼────┼────┤
//!     S    │ ✓  │ ✗  │
//!     X    │ ✗  │ ✗  │
//! ```
//!
//! Requests that conflict with locks held by other transactions fail
//! immediately with [`TxnError::LockConflict`] rather than queueing; the
//! engine executes one statement per thread and treats a conflict as a
//! statement error.

use std::collections::HashMap;
use std::fmt;

use onyx_common::TxnId;
use parking_lot::Mutex;
use thiserror::Error;

/// Lock mode for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock (readers and statement-level DML).
    Shared,
    /// Exclusive lock (DDL and catalog mutation).
    Exclusive,
}

impl LockMode {
    /// Checks whether this mode can coexist with another.
    #[must_use]
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Errors from the transaction layer.
#[derive(Debug, Error)]
pub enum TxnError {
    /// A lock request conflicted with a lock held by another transaction.
    #[error("lock conflict on table file {file_id} ({requested} requested)")]
    LockConflict {
        /// Heap file id the request targeted.
        file_id: u64,
        /// Mode that was requested.
        requested: LockMode,
    },
}

/// Result alias for transaction-layer operations.
pub type TxnResult<T> = Result<T, TxnError>;

#[derive(Debug, Default)]
struct LockState {
    holders: HashMap<TxnId, LockMode>,
}

/// Table-level lock manager.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<u64, LockState>>,
}

impl LockManager {
    /// Creates an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a shared lock on a table's heap file.
    pub fn lock_shared_on_table(&self, txn: TxnId, file_id: u64) -> TxnResult<()> {
        self.lock(txn, file_id, LockMode::Shared)
    }

    /// Acquires an exclusive lock on a table's heap file.
    pub fn lock_exclusive_on_table(&self, txn: TxnId, file_id: u64) -> TxnResult<()> {
        self.lock(txn, file_id, LockMode::Exclusive)
    }

    /// Releases every lock held by `txn`.
    pub fn release_all(&self, txn: TxnId) {
        let mut table = self.table.lock();
        table.retain(|_, state| {
            state.holders.remove(&txn);
            !state.holders.is_empty()
        });
    }

    fn lock(&self, txn: TxnId, file_id: u64, mode: LockMode) -> TxnResult<()> {
        let mut table = self.table.lock();
        let state = table.entry(file_id).or_default();
        for (holder, held) in &state.holders {
            if *holder != txn && !mode.is_compatible_with(held) {
                return Err(TxnError::LockConflict {
                    file_id,
                    requested: mode,
                });
            }
        }
        // Re-entrant: keep the stronger of the held and requested modes.
        let entry = state.holders.entry(txn).or_insert(mode);
        if *entry == LockMode::Shared && mode == LockMode::Exclusive {
            *entry = LockMode::Exclusive;
        }
        Ok(())
    }
}
