//! Sequential heap scan.

use onyx_common::Rid;
use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::db::{Database, FileHandle};
use crate::error::{QueryError, QueryResult};
use crate::executor::eval::eval_conds;
use crate::executor::Executor;
use crate::types::Condition;

/// Scans a table's heap file, yielding records that satisfy every
/// condition.
pub struct SeqScanExec {
    table: String,
    conds: Vec<Condition>,
    file: FileHandle,
    schema: Vec<ColMeta>,
    row_size: usize,
    rids: Vec<Rid>,
    pos: usize,
    current: Option<Record>,
}

impl SeqScanExec {
    /// Builds a sequential scan over `table`.
    pub fn new(db: &Database, table: &str, conds: Vec<Condition>) -> QueryResult<Self> {
        let meta = db.catalog().get_table(table)?.clone();
        let file = db.file(table)?;
        Ok(Self {
            table: table.to_string(),
            conds,
            file,
            row_size: meta.row_size(),
            schema: meta.cols,
            rids: Vec::new(),
            pos: 0,
            current: None,
        })
    }

    /// Moves forward until the record under the cursor matches, or the
    /// scan is exhausted.
    fn seek_match(&mut self) -> QueryResult<()> {
        while self.pos < self.rids.len() {
            let record = self.file.read().get_record(self.rids[self.pos])?;
            if eval_conds(&self.schema, &self.conds, &record.data)? {
                self.current = Some(record);
                return Ok(());
            }
            self.pos += 1;
        }
        self.current = None;
        Ok(())
    }
}

impl Executor for SeqScanExec {
    fn name(&self) -> &'static str {
        "SeqScan"
    }

    fn schema(&self) -> &[ColMeta] {
        &self.schema
    }

    fn row_size(&self) -> usize {
        self.row_size
    }

    fn open(&mut self) -> QueryResult<()> {
        self.rids = self.file.read().scan().collect();
        self.pos = 0;
        self.seek_match()
    }

    fn next(&mut self) -> QueryResult<()> {
        if self.pos < self.rids.len() {
            self.pos += 1;
        }
        self.seek_match()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.rids.len()
    }

    fn current(&self) -> QueryResult<Record> {
        self.current
            .clone()
            .ok_or_else(|| QueryError::Internal(format!("SeqScan({}) read past end", self.table)))
    }

    fn rid(&self) -> Rid {
        self.rids.get(self.pos).copied().unwrap_or(Rid::INVALID)
    }
}
