//! UPDATE executor.
//!
//! The portal materializes the rid vector by draining the statement's
//! scan; this executor then rewrites each row: apply the SET clauses,
//! replace index entries whose keys changed, update the heap record, and
//! append an undo record to the transaction's write set.

use onyx_common::{Rid, TxnId};
use onyx_txn::{Transaction, WriteKind, WriteRecord};
use tracing::debug;

use crate::catalog::{IndexMeta, TabMeta};
use crate::db::{Database, FileHandle, IndexHandle};
use crate::error::{QueryError, QueryResult};
use crate::types::{Condition, SetClause};

/// Applies SET clauses to a materialized set of rows.
#[derive(Debug)]
pub struct UpdateExec {
    table: TabMeta,
    set_clauses: Vec<SetClause>,
    #[allow(dead_code)]
    conds: Vec<Condition>,
    rids: Vec<Rid>,
    file: FileHandle,
    indexes: Vec<(IndexMeta, IndexHandle)>,
}

impl UpdateExec {
    /// Builds the executor over a pre-collected rid vector, taking the
    /// table's shared lock.
    pub fn new(
        db: &Database,
        table: &str,
        set_clauses: Vec<SetClause>,
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
            set_clauses,
            conds,
            rids,
            file,
            indexes,
        })
    }

    /// Runs the update; returns the number of updated rows.
    pub fn run(&mut self, txn: &mut Transaction) -> QueryResult<usize> {
        for &rid in &self.rids {
            let old = self.file.read().get_record(rid)?;
            let mut new_row = old.data.clone();

            for clause in &self.set_clauses {
                let col = self.table.get_col(&clause.col.col_name).ok_or_else(|| {
                    QueryError::ColumnNotFound(clause.col.to_string())
                })?;
                let value = clause.value.cast_to(col.col_type)?;
                let raw = value.to_raw(col.len)?;
                new_row[col.offset..col.offset + col.len].copy_from_slice(&raw);
            }

            self.replace_index_entries(&old.data, &new_row, rid)?;
            self.file.write().update_record(rid, &new_row)?;
            txn.append_write_record(WriteRecord::new(
                WriteKind::Update,
                &self.table.name,
                rid,
                old.data,
            ));
        }
        debug!(table = %self.table.name, rows = self.rids.len(), "updated rows");
        Ok(self.rids.len())
    }

    /// Replaces the entries of every index whose key changed for this
    /// tuple. Indexes whose key bytes are identical are untouched. On an
    /// insert failure the already-replaced indexes of this tuple are
    /// restored to their old keys before the error surfaces.
    fn replace_index_entries(
        &self,
        old_row: &[u8],
        new_row: &[u8],
        rid: Rid,
    ) -> QueryResult<()> {
        let mut replaced: Vec<(&IndexHandle, Vec<u8>, Vec<u8>)> = Vec::new();
        for (ix_meta, handle) in &self.indexes {
            let old_key = ix_meta.build_key(old_row);
            let new_key = ix_meta.build_key(new_row);
            if old_key == new_key {
                continue;
            }
            let failed = {
                let mut index = handle.write();
                index.delete_entry(&old_key)?;
                let page = index.insert_entry(&new_key, rid)?;
                if !page.is_valid() {
                    // Restore this index before unwinding.
                    index.insert_entry(&old_key, rid)?;
                    true
                } else {
                    false
                }
            };
            if failed {
                for (prev_handle, prev_old, prev_new) in replaced.iter().rev() {
                    let mut index = prev_handle.write();
                    index.delete_entry(prev_new)?;
                    index.insert_entry(prev_old, rid)?;
                }
                return Err(QueryError::IndexUpdateFailed(format!(
                    "update of index {} rejected at {}",
                    Database::index_name(&ix_meta.tab_name, &ix_meta.col_names()),
                    rid
                )));
            }
            replaced.push((handle, old_key, new_key));
        }
        Ok(())
    }
}
