//! Transactions and undo bookkeeping.
//!
//! A [`Transaction`] records, per mutation, a [`WriteRecord`] carrying
//! enough state to undo it: the kind of write, the target table, the rid,
//! and (for updates and deletes) the pre-image of the row. The engine
//! replays the write set in reverse on rollback.

use onyx_common::{Rid, TxnId};

/// The kind of heap mutation a write record undoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// A record was inserted; undo deletes it.
    Insert,
    /// A record was overwritten; undo restores the old bytes.
    Update,
    /// A record was deleted; undo re-inserts the old bytes.
    Delete,
}

/// An undo log entry for one heap mutation.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// What happened.
    pub kind: WriteKind,
    /// Table the mutation hit.
    pub table: String,
    /// Record id of the mutated row.
    pub rid: Rid,
    /// Row bytes before the mutation (empty for inserts).
    pub old_row: Vec<u8>,
}

impl WriteRecord {
    /// Creates a write record.
    #[must_use]
    pub fn new(kind: WriteKind, table: impl Into<String>, rid: Rid, old_row: Vec<u8>) -> Self {
        Self {
            kind,
            table: table.into(),
            rid,
            old_row,
        }
    }
}

/// A transaction: an id plus the write set accumulated by DML executors.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    explicit: bool,
    write_set: Vec<WriteRecord>,
}

impl Transaction {
    /// Creates a transaction with the given id.
    #[must_use]
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            explicit: false,
            write_set: Vec::new(),
        }
    }

    /// Marks this transaction as explicitly begun (`BEGIN`).
    #[must_use]
    pub fn explicit(mut self) -> Self {
        self.explicit = true;
        self
    }

    /// The transaction id.
    #[must_use]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Whether the transaction was opened with an explicit `BEGIN`.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Appends an undo record for a mutation that is about to commit to
    /// the heap.
    pub fn append_write_record(&mut self, record: WriteRecord) {
        self.write_set.push(record);
    }

    /// The accumulated write set, oldest first.
    #[must_use]
    pub fn write_set(&self) -> &[WriteRecord] {
        &self.write_set
    }

    /// Drains the write set, newest first, for rollback replay.
    pub fn drain_for_rollback(&mut self) -> Vec<WriteRecord> {
        let mut records = std::mem::take(&mut self.write_set);
        records.reverse();
        records
    }

    /// Discards the write set after a successful commit.
    pub fn clear(&mut self) {
        self.write_set.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_set_order() {
        let mut txn = Transaction::new(TxnId::new(1));
        txn.append_write_record(WriteRecord::new(WriteKind::Insert, "t", Rid::new(0, 0), vec![]));
        txn.append_write_record(WriteRecord::new(
            WriteKind::Update,
            "t",
            Rid::new(0, 1),
            vec![1],
        ));
        assert_eq!(txn.write_set().len(), 2);

        let rollback = txn.drain_for_rollback();
        assert_eq!(rollback[0].kind, WriteKind::Update);
        assert_eq!(rollback[1].kind, WriteKind::Insert);
        assert!(txn.write_set().is_empty());
    }

    #[test]
    fn test_commit_clears() {
        let mut txn = Transaction::new(TxnId::new(1)).explicit();
        assert!(txn.is_explicit());
        txn.append_write_record(WriteRecord::new(WriteKind::Delete, "t", Rid::new(0, 0), vec![9]));
        txn.clear();
        assert!(txn.write_set().is_empty());
    }
}
