//! Volcano-model executors.
//!
//! Every relational operator implements [`Executor`]: `open` positions
//! the iterator on its first row (or at the end), `next` advances, and
//! `current` materializes the row at the cursor without moving it. Rows
//! are fixed-length byte buffers; each executor reports the column
//! schema and row size of what it produces.
//!
//! DML is not row-pulling: [`DmlExec`] wraps the insert/update/delete
//! executors behind a single `run` entry point that mutates the heap and
//! indexes and reports the affected-row count.

use onyx_common::Rid;
use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::error::QueryResult;

pub mod delete;
pub mod eval;
pub mod explain;
pub mod filter;
pub mod index_scan;
pub mod insert;
pub mod nested_loop_join;
pub mod projection;
pub mod seq_scan;
pub mod sort;
pub mod sort_merge_join;
pub mod update;

pub use delete::DeleteExec;
pub use explain::ExplainExec;
pub use filter::FilterExec;
pub use index_scan::IndexScanExec;
pub use insert::InsertExec;
pub use nested_loop_join::NestedLoopJoinExec;
pub use projection::ProjectionExec;
pub use seq_scan::SeqScanExec;
pub use sort::SortExec;
pub use sort_merge_join::SortMergeJoinExec;
pub use update::UpdateExec;

/// A volcano iterator over fixed-length rows.
///
/// Lifecycle: construct, `open()`, then alternate `current()`/`next()`
/// until `at_end()`. `current()` is idempotent between `next()` calls.
/// `open()` may be called again to restart the iterator (the nested-loop
/// join re-opens its left input once per right row).
pub trait Executor {
    /// Executor name for diagnostics.
    fn name(&self) -> &'static str;

    /// Output column schema. Offsets are strictly increasing and bounded
    /// by [`row_size`](Self::row_size).
    fn schema(&self) -> &[ColMeta];

    /// Byte length of produced rows.
    fn row_size(&self) -> usize;

    /// Positions the iterator on the first row, or at the end.
    fn open(&mut self) -> QueryResult<()>;

    /// Advances to the next row.
    fn next(&mut self) -> QueryResult<()>;

    /// True once iteration is exhausted.
    fn at_end(&self) -> bool;

    /// The row under the cursor. Only valid while `!at_end()`.
    fn current(&self) -> QueryResult<Record>;

    /// The heap record id under the cursor. Meaningful for scans only;
    /// other executors report [`Rid::INVALID`].
    fn rid(&self) -> Rid {
        Rid::INVALID
    }
}

/// A boxed executor subtree.
pub type BoxedExecutor = Box<dyn Executor>;

/// The mutation executors, dispatched by statement kind.
#[derive(Debug)]
pub enum DmlExec {
    /// INSERT.
    Insert(InsertExec),
    /// UPDATE.
    Update(UpdateExec),
    /// DELETE.
    Delete(DeleteExec),
}

impl DmlExec {
    /// Runs the mutation, returning the number of affected rows.
    pub fn run(&mut self, txn: &mut onyx_txn::Transaction) -> QueryResult<usize> {
        match self {
            DmlExec::Insert(exec) => exec.run(txn),
            DmlExec::Update(exec) => exec.run(txn),
            DmlExec::Delete(exec) => exec.run(txn),
        }
    }
}
