//! INSERT executor.
//!
//! Builds the row image, inserts it into the heap, then maintains every
//! index in declared order. Index maintenance is all-or-nothing: if an
//! index rejects the entry, every previously inserted entry is removed
//! in reverse order and the heap record is deleted before the error
//! surfaces.

use onyx_common::TxnId;
use onyx_txn::{Transaction, WriteKind, WriteRecord};
use tracing::debug;

use crate::catalog::{IndexMeta, TabMeta};
use crate::db::{Database, FileHandle, IndexHandle};
use crate::error::{QueryError, QueryResult};
use crate::types::Value;

/// Inserts one row into a table, keeping its indexes consistent.
#[derive(Debug)]
pub struct InsertExec {
    table: TabMeta,
    values: Vec<Value>,
    file: FileHandle,
    indexes: Vec<(IndexMeta, IndexHandle)>,
}

impl InsertExec {
    /// Builds the executor, checking value arity and taking the table's
    /// shared lock.
    pub fn new(
        db: &Database,
        table: &str,
        values: Vec<Value>,
        txn_id: TxnId,
    ) -> QueryResult<Self> {
        let meta = db.catalog().get_table(table)?.clone();
        if values.len() != meta.cols.len() {
            return Err(QueryError::InvalidValueCount);
        }
        let file = db.file(table)?;
        db.lock_manager()
            .lock_shared_on_table(txn_id, file.read().file_id())?;
        let mut indexes = Vec::with_capacity(meta.indexes.len());
        for ix_meta in &meta.indexes {
            indexes.push((ix_meta.clone(), db.index_for(ix_meta)?));
        }
        Ok(Self {
            table: meta,
            values,
            file,
            indexes,
        })
    }

    /// Runs the insert; returns the number of inserted rows (1).
    pub fn run(&mut self, txn: &mut Transaction) -> QueryResult<usize> {
        let mut row = vec![0u8; self.table.row_size()];
        for (value, col) in self.values.iter().zip(&self.table.cols) {
            let value = value.cast_to(col.col_type)?;
            let raw = value.to_raw(col.len)?;
            row[col.offset..col.offset + col.len].copy_from_slice(&raw);
        }

        let rid = self.file.write().insert_record(&row)?;

        // Index maintenance with compensation on failure.
        let mut inserted: Vec<(&IndexHandle, Vec<u8>)> = Vec::with_capacity(self.indexes.len());
        for (ix_meta, handle) in &self.indexes {
            let key = ix_meta.build_key(&row);
            let page = handle.write().insert_entry(&key, rid)?;
            if !page.is_valid() {
                for (prev_handle, prev_key) in inserted.iter().rev() {
                    prev_handle.write().delete_entry(prev_key)?;
                }
                self.file.write().delete_record(rid)?;
                return Err(QueryError::IndexUpdateFailed(format!(
                    "insert into index {} rejected; row rolled back",
                    Database::index_name(&ix_meta.tab_name, &ix_meta.col_names())
                )));
            }
            inserted.push((handle, key));
        }

        txn.append_write_record(WriteRecord::new(
            WriteKind::Insert,
            &self.table.name,
            rid,
            Vec::new(),
        ));
        debug!(table = %self.table.name, %rid, "inserted row");
        Ok(1)
    }
}
