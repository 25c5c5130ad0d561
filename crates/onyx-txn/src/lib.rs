//! # onyx-txn
//!
//! Lock manager and transaction bookkeeping for OnyxDB.
//!
//! The query pipeline uses two collaborators from this crate:
//!
//! - [`LockManager`]: table-level shared/exclusive locks keyed by heap
//!   file id. DML executors take a shared table lock at construction.
//! - [`Transaction`]: per-statement/per-session undo bookkeeping. DML
//!   executors append [`WriteRecord`]s before mutating, and rollback
//!   replays them in reverse.
//!
//! Recovery, WAL, and multi-version concurrency are out of scope here;
//! this crate provides exactly the hooks the executors call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod txn;

pub use lock::{LockManager, LockMode, TxnError, TxnResult};
pub use txn::{Transaction, WriteKind, WriteRecord};
