//! Statement engine: the analyze -> plan -> execute entry point.
//!
//! One engine drives one database. `execute` runs a single statement
//! start to finish on the calling thread: semantic analysis, planning,
//! then dispatch — DDL and utility commands run directly against the
//! catalog, DML and SELECT go through the portal's executor trees.
//!
//! Statements outside an explicit transaction run in an implicit one
//! that commits when the statement finishes. BEGIN opens an explicit
//! transaction; ROLLBACK and ABORT replay its write set in reverse,
//! restoring heap rows and index entries.

use onyx_common::TxnId;
use onyx_storage::Record;
use onyx_txn::{Transaction, WriteKind, WriteRecord};
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::ast::{Knob, Statement};
use crate::catalog::ColMeta;
use crate::db::Database;
use crate::error::{QueryError, QueryResult};
use crate::executor::Executor;
use crate::plan::{DdlKind, Plan, UtilityKind};
use crate::planner::Planner;
use crate::portal::{Portal, PortalStmt};

/// The result of one executed statement.
#[derive(Debug)]
pub enum StatementResult {
    /// Rows produced by a SELECT, packed in the projection's record
    /// format.
    Rows {
        /// Output schema of the projection.
        schema: Vec<ColMeta>,
        /// Produced rows.
        rows: Vec<Record>,
    },
    /// Number of rows a DML statement affected.
    Affected(usize),
    /// Rendered EXPLAIN plan.
    Explain(String),
    /// Informational message from DDL, utility, or transaction commands.
    Msg(String),
}

/// Executes statements against one database.
#[derive(Debug)]
pub struct Engine {
    db: Database,
    planner: Planner,
    txn: Option<Transaction>,
    next_txn_id: u64,
}

impl Engine {
    /// Creates an engine over a database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            planner: Planner::new(),
            txn: None,
            next_txn_id: 1,
        }
    }

    /// The underlying database.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The underlying database, mutably (DDL outside SQL, flushing).
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Runs one statement to completion.
    pub fn execute(&mut self, stmt: Statement) -> QueryResult<StatementResult> {
        let query = Analyzer::new(self.db.catalog()).analyze(stmt)?;
        let plan = self.planner.plan(query, self.db.catalog())?;
        match plan {
            Plan::Ddl {
                kind,
                table,
                col_names,
                col_defs,
            } => self.run_ddl(kind, &table, &col_names, &col_defs),
            Plan::Other { kind, table } => self.run_utility(kind, table.as_deref()),
            Plan::SetKnob { knob, value } => {
                match knob {
                    Knob::EnableNestLoop => self.planner.enable_nestloop = value,
                    Knob::EnableSortMerge => self.planner.enable_sortmerge = value,
                }
                Ok(StatementResult::Msg(format!("set to {}", value)))
            }
            dml => self.run_dml(dml),
        }
    }

    // ------------------------------------------------------------------
    // DML and SELECT
    // ------------------------------------------------------------------

    fn run_dml(&mut self, plan: Plan) -> QueryResult<StatementResult> {
        let implicit = self.txn.is_none();
        if implicit {
            self.begin_txn(false);
        }
        let txn_id = self.txn.as_ref().map(Transaction::id).unwrap_or(TxnId::INVALID);

        let result = (|| -> QueryResult<StatementResult> {
            match Portal::new(&self.db).start(plan, txn_id)? {
                PortalStmt::Select { mut root, .. } => {
                    let mut rows = Vec::new();
                    root.open()?;
                    while !root.at_end() {
                        rows.push(root.current()?);
                        root.next()?;
                    }
                    Ok(StatementResult::Rows {
                        schema: root.schema().to_vec(),
                        rows,
                    })
                }
                PortalStmt::Dml(mut exec) => {
                    let txn = self
                        .txn
                        .as_mut()
                        .ok_or_else(|| QueryError::Internal("DML without transaction".into()))?;
                    Ok(StatementResult::Affected(exec.run(txn)?))
                }
                PortalStmt::Explain(exec) => {
                    let record = exec.record();
                    let text = String::from_utf8_lossy(
                        record.data.strip_suffix(&[0]).unwrap_or(&record.data),
                    )
                    .into_owned();
                    Ok(StatementResult::Explain(text))
                }
                PortalStmt::Utility(_) => Err(QueryError::Internal(
                    "utility plan reached the DML path".to_string(),
                )),
            }
        })();

        if implicit {
            // Implicit transactions auto-commit. On error the statement's
            // local changes were already compensated by the executors;
            // whatever committed stays, as there is no enclosing
            // transaction to abort.
            self.finish_txn();
        }
        result
    }

    // ------------------------------------------------------------------
    // DDL
    // ------------------------------------------------------------------

    fn run_ddl(
        &mut self,
        kind: DdlKind,
        table: &str,
        col_names: &[String],
        col_defs: &[crate::types::ColDef],
    ) -> QueryResult<StatementResult> {
        match kind {
            DdlKind::CreateTable => {
                self.db.create_table(table, col_defs)?;
                Ok(StatementResult::Msg(format!("created table {}", table)))
            }
            DdlKind::DropTable => {
                self.db.drop_table(table)?;
                Ok(StatementResult::Msg(format!("dropped table {}", table)))
            }
            DdlKind::CreateIndex => {
                self.db.create_index(table, col_names)?;
                Ok(StatementResult::Msg(format!(
                    "created index {}",
                    Database::index_name(table, col_names)
                )))
            }
            DdlKind::DropIndex => {
                self.db.drop_index(table, col_names)?;
                Ok(StatementResult::Msg(format!(
                    "dropped index {}",
                    Database::index_name(table, col_names)
                )))
            }
        }
    }

    // ------------------------------------------------------------------
    // Utility commands
    // ------------------------------------------------------------------

    fn run_utility(
        &mut self,
        kind: UtilityKind,
        table: Option<&str>,
    ) -> QueryResult<StatementResult> {
        match kind {
            UtilityKind::ShowTables => {
                Ok(StatementResult::Msg(self.db.catalog().table_names().join("\n")))
            }
            UtilityKind::DescTable => {
                let table = table.ok_or_else(|| {
                    QueryError::Internal("DESC without a table".to_string())
                })?;
                let meta = self.db.catalog().get_table(table)?;
                let mut lines = Vec::with_capacity(meta.cols.len());
                for col in &meta.cols {
                    lines.push(format!(
                        "{}\t{}({})\t{}",
                        col.name,
                        col.col_type,
                        col.len,
                        if col.indexed { "indexed" } else { "-" }
                    ));
                }
                Ok(StatementResult::Msg(lines.join("\n")))
            }
            UtilityKind::ShowIndex => {
                let table = table.ok_or_else(|| {
                    QueryError::Internal("SHOW INDEX without a table".to_string())
                })?;
                let meta = self.db.catalog().get_table(table)?;
                let lines: Vec<String> = meta
                    .indexes
                    .iter()
                    .map(|ix| format!("{}\t({})", table, ix.col_names().join(",")))
                    .collect();
                Ok(StatementResult::Msg(lines.join("\n")))
            }
            UtilityKind::Help => Ok(StatementResult::Msg(HELP_TEXT.to_string())),
            UtilityKind::TxnBegin => {
                if self.txn.as_ref().is_some_and(Transaction::is_explicit) {
                    return Ok(StatementResult::Msg("already in a transaction".to_string()));
                }
                self.begin_txn(true);
                Ok(StatementResult::Msg("transaction started".to_string()))
            }
            UtilityKind::TxnCommit => {
                self.finish_txn();
                Ok(StatementResult::Msg("committed".to_string()))
            }
            UtilityKind::TxnAbort => {
                self.rollback_txn()?;
                Ok(StatementResult::Msg("aborted".to_string()))
            }
            UtilityKind::TxnRollback => {
                self.rollback_txn()?;
                Ok(StatementResult::Msg("rolled back".to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Transaction lifecycle
    // ------------------------------------------------------------------

    fn begin_txn(&mut self, explicit: bool) {
        let id = TxnId::new(self.next_txn_id);
        self.next_txn_id += 1;
        let txn = Transaction::new(id);
        self.txn = Some(if explicit { txn.explicit() } else { txn });
        debug!(%id, explicit, "began transaction");
    }

    /// Commits and discards the active transaction, releasing its locks.
    fn finish_txn(&mut self) {
        if let Some(mut txn) = self.txn.take() {
            txn.clear();
            self.db.lock_manager().release_all(txn.id());
            debug!(id = %txn.id(), "finished transaction");
        }
    }

    /// Replays the active transaction's write set in reverse, restoring
    /// heap rows and index entries, then releases its locks.
    fn rollback_txn(&mut self) -> QueryResult<()> {
        let Some(mut txn) = self.txn.take() else {
            return Ok(());
        };
        for record in txn.drain_for_rollback() {
            self.undo_write(&record)?;
        }
        self.db.lock_manager().release_all(txn.id());
        debug!(id = %txn.id(), "rolled back transaction");
        Ok(())
    }

    fn undo_write(&mut self, write: &WriteRecord) -> QueryResult<()> {
        let meta = self.db.catalog().get_table(&write.table)?.clone();
        let file = self.db.file(&write.table)?;
        match write.kind {
            WriteKind::Insert => {
                let record = file.read().get_record(write.rid)?;
                for ix_meta in &meta.indexes {
                    let handle = self.db.index_for(ix_meta)?;
                    handle.write().delete_entry(&ix_meta.build_key(&record.data))?;
                }
                file.write().delete_record(write.rid)?;
            }
            WriteKind::Update => {
                let current = file.read().get_record(write.rid)?;
                for ix_meta in &meta.indexes {
                    let old_key = ix_meta.build_key(&write.old_row);
                    let new_key = ix_meta.build_key(&current.data);
                    if old_key != new_key {
                        let handle = self.db.index_for(ix_meta)?;
                        let mut index = handle.write();
                        index.delete_entry(&new_key)?;
                        index.insert_entry(&old_key, write.rid)?;
                    }
                }
                file.write().update_record(write.rid, &write.old_row)?;
            }
            WriteKind::Delete => {
                // The freed slot may have been reused; the row comes back
                // under a fresh rid and the indexes follow it.
                let rid = file.write().insert_record(&write.old_row)?;
                for ix_meta in &meta.indexes {
                    let handle = self.db.index_for(ix_meta)?;
                    handle
                        .write()
                        .insert_entry(&ix_meta.build_key(&write.old_row), rid)?;
                }
            }
        }
        Ok(())
    }
}

/// HELP output: the SQL surface this engine understands.
const HELP_TEXT: &str = "\
Supported SQL:
  CREATE TABLE t (col TYPE, ...);        DROP TABLE t;
  CREATE INDEX t (col, ...);             DROP INDEX t (col, ...);
  SHOW TABLES;  SHOW INDEX FROM t;  DESC t;
  INSERT INTO t VALUES (...);
  DELETE FROM t [WHERE ...];
  UPDATE t SET col = val [WHERE ...];
  SELECT cols FROM t [AS a] [JOIN u ON ...] [WHERE ...] [ORDER BY col [DESC]];
  EXPLAIN <select>;
  BEGIN; COMMIT; ABORT; ROLLBACK;
  SET enable_nestloop = {true|false};  SET enable_sortmerge = {true|false};";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        AstSetClause, BinaryExpr, ColRef, JoinExpr, JoinType, Literal, OrderByItem, SelectStmt,
        TableRef,
    };
    use crate::types::{ColDef, CompOp};

    fn engine() -> Engine {
        Engine::new(Database::in_memory("test"))
    }

    fn create(engine: &mut Engine, table: &str, defs: Vec<ColDef>) {
        engine
            .execute(Statement::CreateTable {
                table: table.into(),
                fields: defs,
            })
            .unwrap();
    }

    fn insert(engine: &mut Engine, table: &str, values: Vec<Literal>) {
        engine
            .execute(Statement::Insert {
                table: table.into(),
                values,
            })
            .unwrap();
    }

    fn rows_of(result: StatementResult) -> (Vec<ColMeta>, Vec<Record>) {
        match result {
            StatementResult::Rows { schema, rows } => (schema, rows),
            other => panic!("expected rows, got {:?}", other),
        }
    }

    fn int_at(record: &Record, offset: usize) -> i32 {
        i32::from_le_bytes(record.data[offset..offset + 4].try_into().unwrap())
    }

    fn str_at(record: &Record, offset: usize, len: usize) -> String {
        let bytes = &record.data[offset..offset + len];
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    #[test]
    fn test_simple_filter_scenario() {
        // t(a, b) with (1,10),(2,20),(3,30); SELECT a,b WHERE a >= 2.
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a"), ColDef::int("b")]);
        for (a, b) in [(1, 10), (2, 20), (3, 30)] {
            insert(&mut engine, "t", vec![Literal::Int(a), Literal::Int(b)]);
        }
        let result = engine
            .execute(Statement::Select(SelectStmt {
                cols: vec![ColRef::qualified("t", "a"), ColRef::qualified("t", "b")],
                tables: vec![TableRef::new("t")],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("t", "a"),
                    CompOp::Ge,
                    Literal::Int(2),
                )],
                ..Default::default()
            }))
            .unwrap();
        let (schema, rows) = rows_of(result);
        assert_eq!(schema.len(), 2);
        let got: Vec<(i32, i32)> = rows.iter().map(|r| (int_at(r, 0), int_at(r, 4))).collect();
        assert_eq!(got, vec![(2, 20), (3, 30)]);
    }

    #[test]
    fn test_aliased_join_scenario() {
        // SELECT a.n, b.v FROM s AS a JOIN e AS b ON a.id = b.sid
        // WHERE b.v > 60.
        let mut engine = engine();
        create(&mut engine, "s", vec![ColDef::int("id"), ColDef::char("n", 8)]);
        create(&mut engine, "e", vec![ColDef::int("sid"), ColDef::int("v")]);
        insert(&mut engine, "s", vec![Literal::Int(1), Literal::Str("alice".into())]);
        insert(&mut engine, "s", vec![Literal::Int(2), Literal::Str("bob".into())]);
        for (sid, v) in [(1, 100), (1, 200), (2, 50)] {
            insert(&mut engine, "e", vec![Literal::Int(sid), Literal::Int(v)]);
        }
        let result = engine
            .execute(Statement::Select(SelectStmt {
                cols: vec![ColRef::qualified("a", "n"), ColRef::qualified("b", "v")],
                tables: vec![TableRef::aliased("s", "a")],
                joins: vec![JoinExpr {
                    right: TableRef::aliased("e", "b"),
                    conds: vec![BinaryExpr::with_col(
                        ColRef::qualified("a", "id"),
                        CompOp::Eq,
                        ColRef::qualified("b", "sid"),
                    )],
                    join_type: JoinType::Inner,
                }],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("b", "v"),
                    CompOp::Gt,
                    Literal::Int(60),
                )],
                ..Default::default()
            }))
            .unwrap();
        let (_, rows) = rows_of(result);
        let mut got: Vec<(String, i32)> = rows
            .iter()
            .map(|r| (str_at(r, 0, 8), int_at(r, 8)))
            .collect();
        got.sort();
        assert_eq!(
            got,
            vec![("alice".to_string(), 100), ("alice".to_string(), 200)]
        );
    }

    #[test]
    fn test_index_range_scenario() {
        // k(x, y), index on x, rows 1..=10; x > 3 AND x <= 7 in index
        // order.
        let mut engine = engine();
        create(&mut engine, "k", vec![ColDef::int("x"), ColDef::int("y")]);
        engine
            .execute(Statement::CreateIndex {
                table: "k".into(),
                columns: vec!["x".into()],
            })
            .unwrap();
        for x in [10, 4, 2, 8, 6, 1, 9, 3, 7, 5] {
            insert(&mut engine, "k", vec![Literal::Int(x), Literal::Int(0)]);
        }
        let result = engine
            .execute(Statement::Select(SelectStmt {
                cols: vec![ColRef::qualified("k", "x")],
                tables: vec![TableRef::new("k")],
                conds: vec![
                    BinaryExpr::with_literal(
                        ColRef::qualified("k", "x"),
                        CompOp::Gt,
                        Literal::Int(3),
                    ),
                    BinaryExpr::with_literal(
                        ColRef::qualified("k", "x"),
                        CompOp::Le,
                        Literal::Int(7),
                    ),
                ],
                ..Default::default()
            }))
            .unwrap();
        let (_, rows) = rows_of(result);
        let got: Vec<i32> = rows.iter().map(|r| int_at(r, 0)).collect();
        assert_eq!(got, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_order_by_desc_scenario() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a")]);
        for a in [3, 1, 2] {
            insert(&mut engine, "t", vec![Literal::Int(a)]);
        }
        let result = engine
            .execute(Statement::Select(SelectStmt {
                cols: vec![ColRef::qualified("t", "a")],
                tables: vec![TableRef::new("t")],
                order_by: vec![OrderByItem {
                    col: ColRef::bare("a"),
                    desc: true,
                }],
                ..Default::default()
            }))
            .unwrap();
        let (_, rows) = rows_of(result);
        let got: Vec<i32> = rows.iter().map(|r| int_at(r, 0)).collect();
        assert_eq!(got, vec![3, 2, 1]);
    }

    #[test]
    fn test_explain_shape_scenario() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("x")]);
        create(&mut engine, "u", vec![ColDef::int("y")]);
        let result = engine
            .execute(Statement::Explain(SelectStmt {
                cols: vec![ColRef::qualified("a", "x"), ColRef::qualified("b", "y")],
                tables: vec![TableRef::aliased("t", "a"), TableRef::aliased("u", "b")],
                conds: vec![
                    BinaryExpr::with_col(
                        ColRef::qualified("a", "x"),
                        CompOp::Eq,
                        ColRef::qualified("b", "y"),
                    ),
                    BinaryExpr::with_literal(
                        ColRef::qualified("a", "x"),
                        CompOp::Gt,
                        Literal::Int(1),
                    ),
                ],
                ..Default::default()
            }))
            .unwrap();
        let StatementResult::Explain(text) = result else {
            panic!("expected explain output");
        };
        let expected = "Project(columns=[a.x,b.y])\n\
                        \tJoin(tables=[t,u],condition=[a.x=b.y])\n\
                        \t\tFilter(condition=[a.x>1])\n\
                        \t\t\tScan(table=t)\n\
                        \t\tScan(table=u)\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_insert_delete_round_trip() {
        // INSERT followed by DELETE with the same WHERE restores the
        // table and its index.
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a")]);
        engine
            .execute(Statement::CreateIndex {
                table: "t".into(),
                columns: vec!["a".into()],
            })
            .unwrap();
        insert(&mut engine, "t", vec![Literal::Int(1)]);

        insert(&mut engine, "t", vec![Literal::Int(42)]);
        let result = engine
            .execute(Statement::Delete {
                table: "t".into(),
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("t", "a"),
                    CompOp::Eq,
                    Literal::Int(42),
                )],
            })
            .unwrap();
        assert!(matches!(result, StatementResult::Affected(1)));

        assert_eq!(engine.database().file("t").unwrap().read().record_count(), 1);
        let ix = engine
            .database()
            .index(&Database::index_name("t", &["a".to_string()]))
            .unwrap();
        assert_eq!(ix.read().entry_count(), 1);
    }

    #[test]
    fn test_update_via_engine() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a"), ColDef::int("b")]);
        for (a, b) in [(1, 0), (2, 0), (3, 0)] {
            insert(&mut engine, "t", vec![Literal::Int(a), Literal::Int(b)]);
        }
        let result = engine
            .execute(Statement::Update {
                table: "t".into(),
                set_clauses: vec![AstSetClause {
                    column: "b".into(),
                    value: Literal::Int(7),
                }],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("t", "a"),
                    CompOp::Ge,
                    Literal::Int(2),
                )],
            })
            .unwrap();
        assert!(matches!(result, StatementResult::Affected(2)));
        let result = engine
            .execute(Statement::Select(SelectStmt {
                cols: vec![ColRef::qualified("t", "b")],
                tables: vec![TableRef::new("t")],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("t", "b"),
                    CompOp::Eq,
                    Literal::Int(7),
                )],
                ..Default::default()
            }))
            .unwrap();
        let (_, rows) = rows_of(result);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_explicit_txn_rollback_restores_state() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a")]);
        engine
            .execute(Statement::CreateIndex {
                table: "t".into(),
                columns: vec!["a".into()],
            })
            .unwrap();
        insert(&mut engine, "t", vec![Literal::Int(1)]);

        engine.execute(Statement::TxnBegin).unwrap();
        insert(&mut engine, "t", vec![Literal::Int(2)]);
        engine
            .execute(Statement::Update {
                table: "t".into(),
                set_clauses: vec![AstSetClause {
                    column: "a".into(),
                    value: Literal::Int(9),
                }],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("t", "a"),
                    CompOp::Eq,
                    Literal::Int(1),
                )],
            })
            .unwrap();
        engine.execute(Statement::TxnRollback).unwrap();

        assert_eq!(engine.database().file("t").unwrap().read().record_count(), 1);
        let ix = engine
            .database()
            .index(&Database::index_name("t", &["a".to_string()]))
            .unwrap();
        let ix = ix.read();
        assert_eq!(ix.entry_count(), 1);
        assert!(ix.get_entry(&1i32.to_le_bytes()).unwrap().is_some());
        assert!(ix.get_entry(&9i32.to_le_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a")]);
        engine.execute(Statement::TxnBegin).unwrap();
        insert(&mut engine, "t", vec![Literal::Int(5)]);
        engine.execute(Statement::TxnCommit).unwrap();
        assert_eq!(engine.database().file("t").unwrap().read().record_count(), 1);
    }

    #[test]
    fn test_set_knob_controls_join_algo() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("x")]);
        create(&mut engine, "u", vec![ColDef::int("y")]);
        insert(&mut engine, "t", vec![Literal::Int(1)]);
        insert(&mut engine, "u", vec![Literal::Int(1)]);
        let join = Statement::Select(SelectStmt {
            cols: vec![ColRef::qualified("t", "x")],
            tables: vec![TableRef::new("t"), TableRef::new("u")],
            conds: vec![BinaryExpr::with_col(
                ColRef::qualified("t", "x"),
                CompOp::Eq,
                ColRef::qualified("u", "y"),
            )],
            ..Default::default()
        });

        // Sort-merge only still answers correctly.
        engine
            .execute(Statement::SetKnob {
                knob: Knob::EnableNestLoop,
                value: false,
            })
            .unwrap();
        let (_, rows) = rows_of(engine.execute(join.clone()).unwrap());
        assert_eq!(rows.len(), 1);

        // Disabling both is a planner error.
        engine
            .execute(Statement::SetKnob {
                knob: Knob::EnableSortMerge,
                value: false,
            })
            .unwrap();
        assert!(matches!(
            engine.execute(join),
            Err(QueryError::NoJoinAlgorithm)
        ));
    }

    #[test]
    fn test_select_star_projects_everything() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a"), ColDef::char("s", 4)]);
        insert(
            &mut engine,
            "t",
            vec![Literal::Int(1), Literal::Str("hi".into())],
        );
        let (schema, rows) = rows_of(
            engine
                .execute(Statement::Select(SelectStmt {
                    tables: vec![TableRef::new("t")],
                    ..Default::default()
                }))
                .unwrap(),
        );
        assert_eq!(schema.len(), 2);
        assert_eq!(rows[0].data.len(), 8);
        assert_eq!(str_at(&rows[0], 4, 4), "hi");
    }

    #[test]
    fn test_utility_commands() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a")]);
        create(&mut engine, "u", vec![ColDef::int("b")]);
        let StatementResult::Msg(tables) = engine.execute(Statement::ShowTables).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(tables, "t\nu");

        let StatementResult::Msg(desc) = engine
            .execute(Statement::DescTable { table: "t".into() })
            .unwrap()
        else {
            panic!("expected message");
        };
        assert!(desc.contains("INT(4)"));

        engine
            .execute(Statement::CreateIndex {
                table: "t".into(),
                columns: vec!["a".into()],
            })
            .unwrap();
        let StatementResult::Msg(indexes) = engine
            .execute(Statement::ShowIndex { table: "t".into() })
            .unwrap()
        else {
            panic!("expected message");
        };
        assert_eq!(indexes, "t\t(a)");

        assert!(matches!(
            engine.execute(Statement::Help).unwrap(),
            StatementResult::Msg(_)
        ));
    }

    #[test]
    fn test_insert_arity_error_surfaces() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a"), ColDef::int("b")]);
        assert!(matches!(
            engine.execute(Statement::Insert {
                table: "t".into(),
                values: vec![Literal::Int(1)],
            }),
            Err(QueryError::InvalidValueCount)
        ));
        assert_eq!(engine.database().file("t").unwrap().read().record_count(), 0);
    }

    #[test]
    fn test_empty_projection_of_empty_table() {
        let mut engine = engine();
        create(&mut engine, "t", vec![ColDef::int("a")]);
        let (_, rows) = rows_of(
            engine
                .execute(Statement::Select(SelectStmt {
                    tables: vec![TableRef::new("t")],
                    ..Default::default()
                }))
                .unwrap(),
        );
        assert!(rows.is_empty());
    }
}
