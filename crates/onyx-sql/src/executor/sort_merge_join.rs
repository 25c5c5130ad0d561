//! Sort-merge inner join.
//!
//! Both inputs are materialized at `open`. For a single equi-join
//! condition the inputs are sorted on their key columns and merged,
//! emitting the cross product of each equal-key group. Any other
//! condition set falls back to condition-filtered nested iteration over
//! the materialized inputs; either way the result multiset matches the
//! nested-loop join, with unspecified output order.

use std::cmp::Ordering;

use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::error::{QueryError, QueryResult};
use crate::executor::eval::{compare_values, eval_conds, get_col, read_value};
use crate::executor::{BoxedExecutor, Executor};
use crate::types::{CompOp, Condition, CondRhs};

/// Joins two subtrees by sorting and merging on an equi-join key.
pub struct SortMergeJoinExec {
    left: BoxedExecutor,
    right: BoxedExecutor,
    schema: Vec<ColMeta>,
    row_size: usize,
    conds: Vec<Condition>,
    output: Vec<Record>,
    pos: usize,
}

impl SortMergeJoinExec {
    /// Builds a sort-merge join over `left` and `right`.
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
            output: Vec::new(),
            pos: 0,
        }
    }

    /// The equi-join key columns (left, right), when the condition set is
    /// exactly one column-equals-column predicate.
    fn merge_key(&self) -> Option<(ColMeta, ColMeta)> {
        if self.conds.len() != 1 || self.conds[0].op != CompOp::Eq {
            return None;
        }
        let cond = &self.conds[0];
        let CondRhs::Col(rhs) = &cond.rhs else {
            return None;
        };
        match (
            get_col(self.left.schema(), &cond.lhs),
            get_col(self.right.schema(), rhs),
        ) {
            (Ok(l), Ok(r)) => Some((l.clone(), r.clone())),
            _ => {
                // The condition may be written with its sides mirrored.
                match (
                    get_col(self.left.schema(), rhs),
                    get_col(self.right.schema(), &cond.lhs),
                ) {
                    (Ok(l), Ok(r)) => Some((l.clone(), r.clone())),
                    _ => None,
                }
            }
        }
    }

    fn drain(exec: &mut BoxedExecutor) -> QueryResult<Vec<Record>> {
        let mut rows = Vec::new();
        exec.open()?;
        while !exec.at_end() {
            rows.push(exec.current()?);
            exec.next()?;
        }
        Ok(rows)
    }

    fn compose(&self, left: &Record, right: &Record) -> Record {
        let mut data = Vec::with_capacity(self.row_size);
        data.extend_from_slice(&left.data);
        data.extend_from_slice(&right.data);
        Record::new(data)
    }

    fn merge(
        &self,
        mut left_rows: Vec<Record>,
        mut right_rows: Vec<Record>,
        left_key: &ColMeta,
        right_key: &ColMeta,
    ) -> Vec<Record> {
        let key_cmp = |col: &ColMeta| {
            let col = col.clone();
            move |a: &Record, b: &Record| {
                compare_values(&read_value(&a.data, &col), &read_value(&b.data, &col))
                    .unwrap_or(Ordering::Equal)
            }
        };
        left_rows.sort_by(key_cmp(left_key));
        right_rows.sort_by(key_cmp(right_key));

        let mut output = Vec::new();
        let mut i = 0;
        let mut j = 0;
        while i < left_rows.len() && j < right_rows.len() {
            let lv = read_value(&left_rows[i].data, left_key);
            let rv = read_value(&right_rows[j].data, right_key);
            match compare_values(&lv, &rv).unwrap_or(Ordering::Equal) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    // Cross-produce the two equal-key groups.
                    let i_end = (i..left_rows.len())
                        .take_while(|&k| {
                            compare_values(&read_value(&left_rows[k].data, left_key), &lv)
                                .unwrap_or(Ordering::Equal)
                                == Ordering::Equal
                        })
                        .last()
                        .unwrap_or(i)
                        + 1;
                    let j_end = (j..right_rows.len())
                        .take_while(|&k| {
                            compare_values(&read_value(&right_rows[k].data, right_key), &rv)
                                .unwrap_or(Ordering::Equal)
                                == Ordering::Equal
                        })
                        .last()
                        .unwrap_or(j)
                        + 1;
                    for l in &left_rows[i..i_end] {
                        for r in &right_rows[j..j_end] {
                            output.push(self.compose(l, r));
                        }
                    }
                    i = i_end;
                    j = j_end;
                }
            }
        }
        output
    }

    fn cross_filtered(
        &self,
        left_rows: &[Record],
        right_rows: &[Record],
    ) -> QueryResult<Vec<Record>> {
        let mut output = Vec::new();
        for left in left_rows {
            for right in right_rows {
                let record = self.compose(left, right);
                if self.conds.is_empty()
                    || eval_conds(&self.schema, &self.conds, &record.data)?
                {
                    output.push(record);
                }
            }
        }
        Ok(output)
    }
}

impl Executor for SortMergeJoinExec {
    fn name(&self) -> &'static str {
        "SortMergeJoin"
    }

    fn schema(&self) -> &[ColMeta] {
        &self.schema
    }

    fn row_size(&self) -> usize {
        self.row_size
    }

    fn open(&mut self) -> QueryResult<()> {
        let left_rows = Self::drain(&mut self.left)?;
        let right_rows = Self::drain(&mut self.right)?;
        self.output = match self.merge_key() {
            Some((left_key, right_key)) => {
                self.merge(left_rows, right_rows, &left_key, &right_key)
            }
            None => self.cross_filtered(&left_rows, &right_rows)?,
        };
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<()> {
        if self.pos < self.output.len() {
            self.pos += 1;
        }
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.output.len()
    }

    fn current(&self) -> QueryResult<Record> {
        self.output
            .get(self.pos)
            .cloned()
            .ok_or_else(|| QueryError::Internal("SortMergeJoin read past end".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::executor::nested_loop_join::NestedLoopJoinExec;
    use crate::executor::seq_scan::SeqScanExec;
    use crate::types::{ColDef, TabCol, Value};

    fn db() -> Database {
        let mut db = Database::in_memory("test");
        db.create_table("s", &[ColDef::int("id")]).unwrap();
        db.create_table("e", &[ColDef::int("sid"), ColDef::int("v")])
            .unwrap();
        {
            let file = db.file("s").unwrap();
            let mut file = file.write();
            for id in [2i32, 1, 3] {
                file.insert_record(&id.to_le_bytes()).unwrap();
            }
        }
        {
            let file = db.file("e").unwrap();
            let mut file = file.write();
            for (sid, v) in [(1i32, 100i32), (2, 50), (1, 200), (9, 1)] {
                let mut row = sid.to_le_bytes().to_vec();
                row.extend_from_slice(&v.to_le_bytes());
                file.insert_record(&row).unwrap();
            }
        }
        db
    }

    fn scan(db: &Database, table: &str) -> BoxedExecutor {
        Box::new(SeqScanExec::new(db, table, vec![]).unwrap())
    }

    fn drain_sorted(exec: &mut dyn Executor) -> Vec<Vec<u8>> {
        let mut rows = Vec::new();
        exec.open().unwrap();
        while !exec.at_end() {
            rows.push(exec.current().unwrap().data);
            exec.next().unwrap();
        }
        rows.sort();
        rows
    }

    #[test]
    fn test_matches_nested_loop_on_equi_join() {
        let db = db();
        let conds = vec![Condition::with_col(
            TabCol::new("s", "id"),
            CompOp::Eq,
            TabCol::new("e", "sid"),
        )];
        let mut smj = SortMergeJoinExec::new(scan(&db, "s"), scan(&db, "e"), conds.clone());
        let mut nlj = NestedLoopJoinExec::new(scan(&db, "s"), scan(&db, "e"), conds);
        assert_eq!(drain_sorted(&mut smj), drain_sorted(&mut nlj));
    }

    #[test]
    fn test_matches_nested_loop_on_theta_join() {
        let db = db();
        let conds = vec![Condition::with_col(
            TabCol::new("s", "id"),
            CompOp::Lt,
            TabCol::new("e", "sid"),
        )];
        let mut smj = SortMergeJoinExec::new(scan(&db, "s"), scan(&db, "e"), conds.clone());
        let mut nlj = NestedLoopJoinExec::new(scan(&db, "s"), scan(&db, "e"), conds);
        assert_eq!(drain_sorted(&mut smj), drain_sorted(&mut nlj));
    }

    #[test]
    fn test_cartesian_when_no_conds() {
        let db = db();
        let mut smj = SortMergeJoinExec::new(scan(&db, "s"), scan(&db, "e"), vec![]);
        smj.open().unwrap();
        let mut count = 0;
        while !smj.at_end() {
            count += 1;
            smj.next().unwrap();
        }
        assert_eq!(count, 12);
    }

    #[test]
    fn test_extra_condition_falls_back() {
        let db = db();
        let conds = vec![
            Condition::with_col(TabCol::new("s", "id"), CompOp::Eq, TabCol::new("e", "sid")),
            Condition::with_value(TabCol::new("e", "v"), CompOp::Ge, Value::Int(100)),
        ];
        let mut smj = SortMergeJoinExec::new(scan(&db, "s"), scan(&db, "e"), conds.clone());
        let mut nlj = NestedLoopJoinExec::new(scan(&db, "s"), scan(&db, "e"), conds);
        assert_eq!(drain_sorted(&mut smj), drain_sorted(&mut nlj));
    }
}
