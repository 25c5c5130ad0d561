//! # onyx-storage
//!
//! Heap-organized record files and ordered indexes for OnyxDB.
//!
//! This crate implements the two storage collaborators the query pipeline
//! consumes:
//!
//! - [`RecordFile`]: a paged heap of fixed-length records addressed by
//!   [`Rid`](onyx_common::Rid), with insert/get/update/delete and a full
//!   scan.
//! - [`Index`]: an ordered (key, rid) structure with typed key comparison
//!   and position cursors (`lower_bound`/`upper_bound`/`leaf_begin`/
//!   `leaf_end`).
//!
//! Records are opaque byte buffers here; the query layer interprets them
//! via column metadata.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod heap;
pub mod index;

pub use error::{StorageError, StorageResult};
pub use heap::{Record, RecordFile, RecordScan};
pub use index::{Index, IndexCursor, IndexPos, KeyField, KeyKind, KeyLayout};
