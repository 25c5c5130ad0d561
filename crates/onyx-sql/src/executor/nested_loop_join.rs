//! Nested-loop inner join.
//!
//! Produces the cross product of its inputs filtered by the join
//! conditions. The left input is the inner loop: it runs to exhaustion
//! and is re-opened for every advance of the right input, so the left
//! executor must support repeated `open()`.

use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::error::QueryResult;
use crate::executor::eval::eval_conds;
use crate::executor::{BoxedExecutor, Executor};
use crate::types::Condition;

/// Joins two subtrees by nested iteration.
///
/// The composite row is the left row followed by the right row; the
/// composite schema shifts every right column's offset by the left row
/// size.
pub struct NestedLoopJoinExec {
    left: BoxedExecutor,
    right: BoxedExecutor,
    schema: Vec<ColMeta>,
    row_size: usize,
    conds: Vec<Condition>,
    current: Option<Record>,
    ended: bool,
}

impl NestedLoopJoinExec {
    /// Builds a join over `left` and `right` with the given conditions.
    #[must_use]
    pub fn new(left: BoxedExecutor, right: BoxedExecutor, conds: Vec<Condition>) -> Self {
        let mut schema = left.schema().to_vec();
        let left_size = left.row_size();
        for col in right.schema() {
            let mut col = col.clone();
            col.offset += left_size;
            schema.push(col);
        }
        let row_size = left_size + right.row_size();
        Self {
            left,
            right,
            schema,
            row_size,
            conds,
            current: None,
            ended: false,
        }
    }

    fn compose(&self) -> QueryResult<Record> {
        let mut data = Vec::with_capacity(self.row_size);
        data.extend_from_slice(&self.left.current()?.data);
        data.extend_from_slice(&self.right.current()?.data);
        Ok(Record::new(data))
    }

    /// Steps the nested iteration one position: the left input advances;
    /// when it runs out the right input moves and the left restarts.
    fn advance(&mut self) -> QueryResult<()> {
        self.left.next()?;
        if self.left.at_end() {
            self.right.next()?;
            self.left.open()?;
        }
        Ok(())
    }

    fn find_match(&mut self) -> QueryResult<()> {
        while !self.right.at_end() {
            if self.left.at_end() {
                break;
            }
            let record = self.compose()?;
            if self.conds.is_empty() || eval_conds(&self.schema, &self.conds, &record.data)? {
                self.current = Some(record);
                return Ok(());
            }
            self.advance()?;
        }
        self.current = None;
        self.ended = true;
        Ok(())
    }
}

impl Executor for NestedLoopJoinExec {
    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }

    fn schema(&self) -> &[ColMeta] {
        &self.schema
    }

    fn row_size(&self) -> usize {
        self.row_size
    }

    fn open(&mut self) -> QueryResult<()> {
        self.ended = false;
        self.current = None;
        self.left.open()?;
        self.right.open()?;
        if self.left.at_end() || self.right.at_end() {
            self.ended = true;
            return Ok(());
        }
        self.find_match()
    }

    fn next(&mut self) -> QueryResult<()> {
        if self.ended {
            return Ok(());
        }
        self.advance()?;
        self.find_match()
    }

    fn at_end(&self) -> bool {
        self.ended
    }

    fn current(&self) -> QueryResult<Record> {
        self.current.clone().ok_or_else(|| {
            crate::error::QueryError::Internal("NestedLoopJoin read past end".to_string())
        })
    }
}
