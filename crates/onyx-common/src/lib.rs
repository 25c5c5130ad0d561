//! # onyx-common
//!
//! Common types and constants for OnyxDB.
//!
//! This crate provides the foundational identifier types shared by the
//! storage, transaction, and query layers:
//!
//! - **Types**: `PageId`, `Rid`, `TxnId`
//! - **Constants**: page geometry and file-format limits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::{PageId, Rid, TxnId};
