//! Residual predicate filter.

use onyx_common::Rid;
use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::error::QueryResult;
use crate::executor::eval::eval_conds;
use crate::executor::{BoxedExecutor, Executor};
use crate::types::Condition;

/// Passes through the child's rows that satisfy every condition.
/// Schema, row size, and rid are transparent.
pub struct FilterExec {
    child: BoxedExecutor,
    conds: Vec<Condition>,
}

impl FilterExec {
    /// Wraps `child` with a conjunction of conditions.
    #[must_use]
    pub fn new(child: BoxedExecutor, conds: Vec<Condition>) -> Self {
        Self { child, conds }
    }

    fn seek_match(&mut self) -> QueryResult<()> {
        while !self.child.at_end() {
            let record = self.child.current()?;
            if eval_conds(self.child.schema(), &self.conds, &record.data)? {
                return Ok(());
            }
            self.child.next()?;
        }
        Ok(())
    }
}

impl Executor for FilterExec {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn schema(&self) -> &[ColMeta] {
        self.child.schema()
    }

    fn row_size(&self) -> usize {
        self.child.row_size()
    }

    fn open(&mut self) -> QueryResult<()> {
        self.child.open()?;
        self.seek_match()
    }

    fn next(&mut self) -> QueryResult<()> {
        if !self.child.at_end() {
            self.child.next()?;
        }
        self.seek_match()
    }

    fn at_end(&self) -> bool {
        self.child.at_end()
    }

    fn current(&self) -> QueryResult<Record> {
        self.child.current()
    }

    fn rid(&self) -> Rid {
        self.child.rid()
    }
}
