//! Index range scan.
//!
//! The scan derives a single-column range `[lo, hi]` from the literal
//! predicates on the chosen index's first column, walks the index between
//! the corresponding positions, and re-evaluates *all* conditions against
//! each fetched row (covering NE and any secondary-column predicates the
//! range cannot express).

use onyx_common::Rid;
use onyx_storage::{IndexPos, Record};

use crate::catalog::{ColMeta, IndexMeta};
use crate::db::{Database, FileHandle, IndexHandle};
use crate::error::{QueryError, QueryResult};
use crate::executor::eval::{compare_values, eval_conds};
use crate::executor::Executor;
use crate::types::{Condition, CompOp, Value};

/// One end of the scan range: a value plus inclusivity.
#[derive(Debug, Clone)]
struct RangeBound {
    value: Value,
    inclusive: bool,
}

/// Scans a table through one of its indexes.
pub struct IndexScanExec {
    table: String,
    conds: Vec<Condition>,
    file: FileHandle,
    index: IndexHandle,
    index_meta: IndexMeta,
    schema: Vec<ColMeta>,
    row_size: usize,
    rids: Vec<Rid>,
    pos: usize,
    current: Option<Record>,
}

impl IndexScanExec {
    /// Builds an index scan over `table` using the index on `index_cols`.
    ///
    /// Incoming conditions whose left side references another table are
    /// normalized first: they must be column-vs-column predicates whose
    /// right side is this table, and are flipped (with the operator
    /// mirrored) so the left side is always table-local.
    pub fn new(
        db: &Database,
        table: &str,
        mut conds: Vec<Condition>,
        index_cols: &[String],
    ) -> QueryResult<Self> {
        let meta = db.catalog().get_table(table)?.clone();
        let index_meta = meta
            .get_index_meta(index_cols)
            .cloned()
            .ok_or_else(|| QueryError::IndexNotFound(Database::index_name(table, index_cols)))?;
        for cond in &mut conds {
            if cond.lhs.tab_name != table {
                let flippable = cond
                    .rhs_col()
                    .is_some_and(|rhs| rhs.tab_name == table);
                if !flippable {
                    return Err(QueryError::Internal(format!(
                        "foreign predicate on index scan of {}",
                        table
                    )));
                }
                cond.swap_sides();
            }
        }
        let file = db.file(table)?;
        let index = db.index_for(&index_meta)?;
        Ok(Self {
            table: table.to_string(),
            conds,
            file,
            index,
            index_meta,
            row_size: meta.row_size(),
            schema: meta.cols,
            rids: Vec::new(),
            pos: 0,
            current: None,
        })
    }

    /// Computes the `[lo, hi]` bounds over the index's first column from
    /// the literal predicates on it. NE never narrows the range.
    fn compute_bounds(&self) -> QueryResult<(Option<RangeBound>, Option<RangeBound>)> {
        let first_col = &self.index_meta.cols[0];
        let mut lo: Option<RangeBound> = None;
        let mut hi: Option<RangeBound> = None;
        for cond in &self.conds {
            let value = match &cond.rhs {
                crate::types::CondRhs::Value(value) => value,
                crate::types::CondRhs::Col(_) => continue,
            };
            if cond.lhs.col_name != first_col.name {
                continue;
            }
            match cond.op {
                CompOp::Eq => {
                    raise_lo(&mut lo, value, true)?;
                    lower_hi(&mut hi, value, true)?;
                }
                CompOp::Gt => raise_lo(&mut lo, value, false)?,
                CompOp::Ge => raise_lo(&mut lo, value, true)?,
                CompOp::Lt => lower_hi(&mut hi, value, false)?,
                CompOp::Le => lower_hi(&mut hi, value, true)?,
                CompOp::Ne => {}
            }
        }
        Ok((lo, hi))
    }

    /// Builds a full-length probe key for the first column's `value`,
    /// padding the remaining key fields with their minimum or maximum.
    fn probe_key(&self, value: &Value, pad_max: bool) -> QueryResult<Vec<u8>> {
        let layout = self.index_meta.key_layout();
        let first_len = self.index_meta.cols[0].len;
        let mut key = value.to_raw(first_len)?;
        for field in &layout.fields()[1..] {
            key.extend_from_slice(&if pad_max {
                field.max_bytes()
            } else {
                field.min_bytes()
            });
        }
        Ok(key)
    }

    fn range_positions(&self) -> QueryResult<(IndexPos, IndexPos)> {
        let (lo, hi) = self.compute_bounds()?;
        let index = self.index.read();
        let lo_pos = match &lo {
            None => index.leaf_begin(),
            Some(bound) if bound.inclusive => {
                index.lower_bound(&self.probe_key(&bound.value, false)?)?
            }
            Some(bound) => index.upper_bound(&self.probe_key(&bound.value, true)?)?,
        };
        let hi_pos = match &hi {
            None => index.leaf_end(),
            Some(bound) if bound.inclusive => {
                index.upper_bound(&self.probe_key(&bound.value, true)?)?
            }
            Some(bound) => index.lower_bound(&self.probe_key(&bound.value, false)?)?,
        };
        Ok((lo_pos, hi_pos))
    }

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

/// Tightens the lower bound: the strictest of all GT/GE predicates.
fn raise_lo(lo: &mut Option<RangeBound>, value: &Value, inclusive: bool) -> QueryResult<()> {
    let replace = match lo {
        None => true,
        Some(cur) => {
            let ord = compare_values(value, &cur.value)?;
            ord == std::cmp::Ordering::Greater
                || (ord == std::cmp::Ordering::Equal && cur.inclusive && !inclusive)
        }
    };
    if replace {
        *lo = Some(RangeBound {
            value: value.clone(),
            inclusive,
        });
    }
    Ok(())
}

/// Tightens the upper bound: the strictest of all LT/LE predicates.
fn lower_hi(hi: &mut Option<RangeBound>, value: &Value, inclusive: bool) -> QueryResult<()> {
    let replace = match hi {
        None => true,
        Some(cur) => {
            let ord = compare_values(value, &cur.value)?;
            ord == std::cmp::Ordering::Less
                || (ord == std::cmp::Ordering::Equal && cur.inclusive && !inclusive)
        }
    };
    if replace {
        *hi = Some(RangeBound {
            value: value.clone(),
            inclusive,
        });
    }
    Ok(())
}

impl Executor for IndexScanExec {
    fn name(&self) -> &'static str {
        "IndexScan"
    }

    fn schema(&self) -> &[ColMeta] {
        &self.schema
    }

    fn row_size(&self) -> usize {
        self.row_size
    }

    fn open(&mut self) -> QueryResult<()> {
        let (lo_pos, hi_pos) = self.range_positions()?;
        self.rids = if lo_pos <= hi_pos {
            self.index.read().collect_range(lo_pos, hi_pos)
        } else {
            Vec::new()
        };
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
        self.current.clone().ok_or_else(|| {
            QueryError::Internal(format!("IndexScan({}) read past end", self.table))
        })
    }

    fn rid(&self) -> Rid {
        self.rids.get(self.pos).copied().unwrap_or(Rid::INVALID)
    }
}
