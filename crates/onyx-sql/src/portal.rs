//! The portal: plan trees become executor trees.
//!
//! `start` dispatches on the statement shape. SELECT plans convert
//! recursively into a volcano tree rooted at the projection. UPDATE and
//! DELETE first drain their scan to collect the victim rid vector, then
//! build the mutation executor over it. DDL and utility plans pass
//! through untouched — the engine runs them directly against the
//! catalog.

use onyx_common::{Rid, TxnId};

use crate::db::Database;
use crate::error::{QueryError, QueryResult};
use crate::executor::{
    BoxedExecutor, DeleteExec, DmlExec, ExplainExec, Executor, FilterExec, IndexScanExec,
    InsertExec, NestedLoopJoinExec, ProjectionExec, SeqScanExec, SortExec, SortMergeJoinExec,
    UpdateExec,
};
use crate::plan::{DmlKind, JoinAlgo, Plan, ScanKind};
use crate::types::TabCol;

/// A statement prepared for execution.
pub enum PortalStmt {
    /// A row-returning query.
    Select {
        /// Output columns, in projection order.
        sel_cols: Vec<TabCol>,
        /// Root of the executor tree.
        root: BoxedExecutor,
    },
    /// A mutation.
    Dml(DmlExec),
    /// An EXPLAIN rendering.
    Explain(ExplainExec),
    /// DDL or a utility command, run by the engine's dispatcher.
    Utility(Plan),
}

/// Converts plans into executors against one database.
#[derive(Debug)]
pub struct Portal<'a> {
    db: &'a Database,
}

impl<'a> Portal<'a> {
    /// Creates a portal over `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Prepares a plan for execution under the given transaction.
    pub fn start(&self, plan: Plan, txn_id: TxnId) -> QueryResult<PortalStmt> {
        match plan {
            Plan::Ddl { .. } | Plan::Other { .. } | Plan::SetKnob { .. } => {
                Ok(PortalStmt::Utility(plan))
            }
            Plan::Dml {
                kind,
                subplan,
                table,
                values,
                conds,
                set_clauses,
                alias_map,
                is_select_star,
            } => match kind {
                DmlKind::Explain => {
                    let subplan = require_subplan(subplan)?;
                    Ok(PortalStmt::Explain(ExplainExec::new(
                        *subplan,
                        alias_map,
                        is_select_star,
                    )))
                }
                DmlKind::Select => {
                    let subplan = require_subplan(subplan)?;
                    let sel_cols = match subplan.as_ref() {
                        Plan::Project { cols, .. } => cols.clone(),
                        _ => Vec::new(),
                    };
                    let root = self.convert(*subplan)?;
                    Ok(PortalStmt::Select { sel_cols, root })
                }
                DmlKind::Insert => Ok(PortalStmt::Dml(DmlExec::Insert(InsertExec::new(
                    self.db, &table, values, txn_id,
                )?))),
                DmlKind::Update => {
                    let scan = self.convert(*require_subplan(subplan)?)?;
                    let rids = drain_rids(scan)?;
                    Ok(PortalStmt::Dml(DmlExec::Update(UpdateExec::new(
                        self.db,
                        &table,
                        set_clauses,
                        conds,
                        rids,
                        txn_id,
                    )?)))
                }
                DmlKind::Delete => {
                    let scan = self.convert(*require_subplan(subplan)?)?;
                    let rids = drain_rids(scan)?;
                    Ok(PortalStmt::Dml(DmlExec::Delete(DeleteExec::new(
                        self.db, &table, conds, rids, txn_id,
                    )?)))
                }
            },
            other => Err(QueryError::Internal(format!(
                "plan is not executable: {:?}",
                other
            ))),
        }
    }

    /// Recursively converts a plan subtree into its executor tree. The
    /// produced tree uniquely owns its children and releases them when
    /// dropped.
    pub fn convert(&self, plan: Plan) -> QueryResult<BoxedExecutor> {
        match plan {
            Plan::Project { child, cols } => {
                let child = self.convert(*child)?;
                Ok(Box::new(ProjectionExec::new(child, &cols)?))
            }
            Plan::Scan {
                kind: ScanKind::Seq,
                table,
                conds,
                ..
            } => Ok(Box::new(SeqScanExec::new(self.db, &table, conds)?)),
            Plan::Scan {
                kind: ScanKind::Index,
                table,
                conds,
                index_cols,
            } => Ok(Box::new(IndexScanExec::new(
                self.db,
                &table,
                conds,
                &index_cols,
            )?)),
            Plan::Join {
                algo,
                left,
                right,
                conds,
            } => {
                let left = self.convert(*left)?;
                let right = self.convert(*right)?;
                Ok(match algo {
                    JoinAlgo::NestLoop => Box::new(NestedLoopJoinExec::new(left, right, conds)),
                    JoinAlgo::SortMerge => Box::new(SortMergeJoinExec::new(left, right, conds)),
                })
            }
            Plan::Sort { child, cols, desc } => {
                let child = self.convert(*child)?;
                Ok(Box::new(SortExec::new(child, &cols, desc)?))
            }
            Plan::Filter { child, conds } => {
                let child = self.convert(*child)?;
                Ok(Box::new(FilterExec::new(child, conds)))
            }
            other => Err(QueryError::Internal(format!(
                "plan node has no executor: {:?}",
                other
            ))),
        }
    }
}

fn require_subplan(subplan: Option<Box<Plan>>) -> QueryResult<Box<Plan>> {
    subplan.ok_or_else(|| QueryError::Internal("DML wrapper without subplan".to_string()))
}

/// Drains a scan executor, collecting the rid of every produced row.
fn drain_rids(mut scan: BoxedExecutor) -> QueryResult<Vec<Rid>> {
    let mut rids = Vec::new();
    scan.open()?;
    while !scan.at_end() {
        rids.push(scan.rid());
        scan.next()?;
    }
    Ok(rids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColDef, CompOp, Condition, Value};

    fn db_with_rows() -> Database {
        let mut db = Database::in_memory("test");
        db.create_table("t", &[ColDef::int("a")]).unwrap();
        let file = db.file("t").unwrap();
        let mut file = file.write();
        for a in [1i32, 2, 3] {
            file.insert_record(&a.to_le_bytes()).unwrap();
        }
        drop(file);
        db
    }

    #[test]
    fn test_convert_select_tree() {
        let db = db_with_rows();
        let plan = Plan::Project {
            child: Box::new(Plan::Filter {
                child: Box::new(Plan::seq_scan("t", vec![])),
                conds: vec![Condition::with_value(
                    TabCol::new("t", "a"),
                    CompOp::Ge,
                    Value::Int(2),
                )],
            }),
            cols: vec![TabCol::new("t", "a")],
        };
        let mut root = Portal::new(&db).convert(plan).unwrap();
        let mut seen = Vec::new();
        root.open().unwrap();
        while !root.at_end() {
            let row = root.current().unwrap();
            seen.push(i32::from_le_bytes(row.data[0..4].try_into().unwrap()));
            root.next().unwrap();
        }
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn test_update_drains_rid_vector() {
        let db = db_with_rows();
        let plan = Plan::Dml {
            kind: DmlKind::Delete,
            subplan: Some(Box::new(Plan::seq_scan(
                "t",
                vec![Condition::with_value(
                    TabCol::new("t", "a"),
                    CompOp::Gt,
                    Value::Int(1),
                )],
            ))),
            table: "t".into(),
            values: vec![],
            conds: vec![],
            set_clauses: vec![],
            alias_map: Default::default(),
            is_select_star: false,
        };
        let stmt = Portal::new(&db).start(plan, TxnId::new(1)).unwrap();
        let PortalStmt::Dml(mut exec) = stmt else {
            panic!("expected DML statement");
        };
        let mut txn = onyx_txn::Transaction::new(TxnId::new(1));
        assert_eq!(exec.run(&mut txn).unwrap(), 2);
        assert_eq!(db.file("t").unwrap().read().record_count(), 1);
    }

    #[test]
    fn test_utility_passthrough() {
        let db = db_with_rows();
        let plan = Plan::Other {
            kind: crate::plan::UtilityKind::ShowTables,
            table: None,
        };
        let stmt = Portal::new(&db).start(plan.clone(), TxnId::new(1)).unwrap();
        assert!(matches!(stmt, PortalStmt::Utility(p) if p == plan));
    }
}
