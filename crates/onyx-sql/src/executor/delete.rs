//! DELETE executor.
//!
//! Works off the rid vector materialized by the portal. Index entries
//! are removed before the heap record so a crash cannot leave an index
//! entry pointing at a reused slot, and a DELETE undo record carrying
//! the old row is appended per tuple.

use onyx_common::{Rid, TxnId};
use onyx_txn::{Transaction, WriteKind, WriteRecord};
use tracing::debug;

use crate::catalog::{IndexMeta, TabMeta};
use crate::db::{Database, FileHandle, IndexHandle};
use crate::error::QueryResult;
use crate::types::Condition;

/// Deletes a materialized set of rows.
#[derive(Debug)]
pub struct DeleteExec {
    table: TabMeta,
    #[allow(dead_code)]
    conds: Vec<Condition>,
    rids: Vec<Rid>,
    file: FileHandle,
    indexes: Vec<(IndexMeta, IndexHandle)>,
}

impl DeleteExec {
    /// Builds the executor over a pre-collected rid vector, taking the
    /// table's shared lock.
    pub fn new(
        db: &Database,
        table: &str,
        conds: Vec<Condition>,
        rids: Vec<Rid>,
        txn_id: TxnId,
    ) -> QueryResult<Self> {
        let meta = db.catalog().get_table(table)?.clone();
        let file = db.file(table)?;
        db.lock_manager()
            .lock_shared_on_table(txn_id, file.read().file_id())?;
        let mut indexes = Vec::with_capacity(meta.indexes.len());
        for ix_meta in &meta.indexes {
            indexes.push((ix_meta.clone(), db.index_for(ix_meta)?));
        }
        Ok(Self {
            table: meta,
            conds,
            rids,
            file,
            indexes,
        })
    }

    /// Runs the delete; returns the number of deleted rows.
    pub fn run(&mut self, txn: &mut Transaction) -> QueryResult<usize> {
        for &rid in &self.rids {
            let record = self.file.read().get_record(rid)?;
            for (ix_meta, handle) in &self.indexes {
                let key = ix_meta.build_key(&record.data);
                handle.write().delete_entry(&key)?;
            }
            self.file.write().delete_record(rid)?;
            txn.append_write_record(WriteRecord::new(
                WriteKind::Delete,
                &self.table.name,
                rid,
                record.data,
            ));
        }
        debug!(table = %self.table.name, rows = self.rids.len(), "deleted rows");
        Ok(self.rids.len())
    }
}
