//! In-memory sort.
//!
//! The child is drained at `open` and stable-sorted on the key list, so
//! rows equal on every key keep their input order. Sorting is bounded
//! only by memory; out-of-core sorting is out of scope.

use std::cmp::Ordering;

use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::error::{QueryError, QueryResult};
use crate::executor::eval::{compare_values, get_col, read_value};
use crate::executor::{BoxedExecutor, Executor};
use crate::types::TabCol;

/// Stable multi-key sort over a materialized child.
pub struct SortExec {
    child: BoxedExecutor,
    keys: Vec<ColMeta>,
    desc: Vec<bool>,
    rows: Vec<Record>,
    pos: usize,
}

impl SortExec {
    /// Builds a sort over `child` keyed by `cols` with per-key direction
    /// flags.
    pub fn new(child: BoxedExecutor, cols: &[TabCol], desc: Vec<bool>) -> QueryResult<Self> {
        let mut keys = Vec::with_capacity(cols.len());
        for col in cols {
            keys.push(get_col(child.schema(), col)?.clone());
        }
        Ok(Self {
            child,
            keys,
            desc,
            rows: Vec::new(),
            pos: 0,
        })
    }

    /// Compares two rows over the key list. Keys read exactly the
    /// column's declared width; strings compare NUL-trimmed.
    fn compare_rows(&self, a: &Record, b: &Record) -> Ordering {
        for (key, desc) in self.keys.iter().zip(&self.desc) {
            let ord = compare_values(&read_value(&a.data, key), &read_value(&b.data, key))
                .unwrap_or(Ordering::Equal);
            if ord != Ordering::Equal {
                return if *desc { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    }
}

impl Executor for SortExec {
    fn name(&self) -> &'static str {
        "Sort"
    }

    fn schema(&self) -> &[ColMeta] {
        self.child.schema()
    }

    fn row_size(&self) -> usize {
        self.child.row_size()
    }

    fn open(&mut self) -> QueryResult<()> {
        let mut rows = Vec::new();
        self.child.open()?;
        while !self.child.at_end() {
            rows.push(self.child.current()?);
            self.child.next()?;
        }
        // Stable: rows with equal keys keep input order.
        rows.sort_by(|a, b| self.compare_rows(a, b));
        self.rows = rows;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<()> {
        if self.pos < self.rows.len() {
            self.pos += 1;
        }
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.rows.len()
    }

    fn current(&self) -> QueryResult<Record> {
        self.rows
            .get(self.pos)
            .cloned()
            .ok_or_else(|| QueryError::Internal("Sort read past end".to_string()))
    }
}
