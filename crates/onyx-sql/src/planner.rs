//! Query planning: logical rewrites and physical plan construction.
//!
//! Planning runs in two passes. The logical pass collects the required
//! column set (projection pushdown) and greedily reorders the table list
//! by estimated cardinality (join order). The physical pass builds one
//! relation per statement: per-table predicates are popped into scans,
//! index access paths are chosen, cross-table predicates drive a
//! left-deep join tree, residual literal predicates become Filter nodes
//! above sequential scans, and ORDER BY / projection wrap the result.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::analyzer::Query;
use crate::ast::{OrderByItem, SelectStmt, Statement};
use crate::catalog::Catalog;
use crate::error::{QueryError, QueryResult};
use crate::plan::{DdlKind, DmlKind, JoinAlgo, Plan, ScanKind, UtilityKind};
use crate::types::{Condition, TabCol};

/// Cardinality assumed for every table until real statistics exist.
/// A uniform value keeps the greedy join reorder a stable no-op.
const DEFAULT_CARDINALITY: u64 = 1000;

/// The query planner.
#[derive(Debug, Clone)]
pub struct Planner {
    /// Whether nested-loop join may be chosen.
    pub enable_nestloop: bool,
    /// Whether sort-merge join may be chosen.
    pub enable_sortmerge: bool,
}

impl Default for Planner {
    fn default() -> Self {
        Self {
            enable_nestloop: true,
            enable_sortmerge: true,
        }
    }
}

impl Planner {
    /// Creates a planner with default knobs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the physical plan for a resolved query.
    pub fn plan(&self, query: Query, catalog: &Catalog) -> QueryResult<Plan> {
        match &query.stmt {
            Statement::CreateTable { table, fields } => Ok(Plan::Ddl {
                kind: DdlKind::CreateTable,
                table: table.clone(),
                col_names: Vec::new(),
                col_defs: fields.clone(),
            }),
            Statement::DropTable { table } => Ok(Plan::Ddl {
                kind: DdlKind::DropTable,
                table: table.clone(),
                col_names: Vec::new(),
                col_defs: Vec::new(),
            }),
            Statement::CreateIndex { table, columns } => Ok(Plan::Ddl {
                kind: DdlKind::CreateIndex,
                table: table.clone(),
                col_names: columns.clone(),
                col_defs: Vec::new(),
            }),
            Statement::DropIndex { table, columns } => Ok(Plan::Ddl {
                kind: DdlKind::DropIndex,
                table: table.clone(),
                col_names: columns.clone(),
                col_defs: Vec::new(),
            }),
            Statement::ShowIndex { table } => Ok(Plan::Other {
                kind: UtilityKind::ShowIndex,
                table: Some(table.clone()),
            }),
            Statement::ShowTables => Ok(Plan::Other {
                kind: UtilityKind::ShowTables,
                table: None,
            }),
            Statement::DescTable { table } => Ok(Plan::Other {
                kind: UtilityKind::DescTable,
                table: Some(table.clone()),
            }),
            Statement::Help => Ok(Plan::Other {
                kind: UtilityKind::Help,
                table: None,
            }),
            Statement::TxnBegin => Ok(Plan::Other {
                kind: UtilityKind::TxnBegin,
                table: None,
            }),
            Statement::TxnCommit => Ok(Plan::Other {
                kind: UtilityKind::TxnCommit,
                table: None,
            }),
            Statement::TxnAbort => Ok(Plan::Other {
                kind: UtilityKind::TxnAbort,
                table: None,
            }),
            Statement::TxnRollback => Ok(Plan::Other {
                kind: UtilityKind::TxnRollback,
                table: None,
            }),
            Statement::SetKnob { knob, value } => Ok(Plan::SetKnob {
                knob: *knob,
                value: *value,
            }),
            Statement::Insert { table, .. } => Ok(Plan::Dml {
                kind: DmlKind::Insert,
                subplan: None,
                table: table.clone(),
                values: query.values,
                conds: Vec::new(),
                set_clauses: Vec::new(),
                alias_map: HashMap::new(),
                is_select_star: false,
            }),
            Statement::Delete { table, .. } => {
                let table = table.clone();
                let scan = self.build_dml_scan(catalog, &table, query.conds.clone())?;
                Ok(Plan::Dml {
                    kind: DmlKind::Delete,
                    subplan: Some(Box::new(scan)),
                    table,
                    values: Vec::new(),
                    conds: query.conds,
                    set_clauses: Vec::new(),
                    alias_map: HashMap::new(),
                    is_select_star: false,
                })
            }
            Statement::Update { table, .. } => {
                let table = table.clone();
                let scan = self.build_dml_scan(catalog, &table, query.conds.clone())?;
                Ok(Plan::Dml {
                    kind: DmlKind::Update,
                    subplan: Some(Box::new(scan)),
                    table,
                    values: Vec::new(),
                    conds: query.conds,
                    set_clauses: query.set_clauses,
                    alias_map: HashMap::new(),
                    is_select_star: false,
                })
            }
            Statement::Select(_) | Statement::Explain(_) => {
                let kind = match &query.stmt {
                    Statement::Explain(_) => DmlKind::Explain,
                    _ => DmlKind::Select,
                };
                let alias_map = query.alias_map.clone();
                let is_select_star = query.is_select_star;
                let root = self.generate_select_plan(query, catalog)?;
                Ok(Plan::Dml {
                    kind,
                    subplan: Some(Box::new(root)),
                    table: String::new(),
                    values: Vec::new(),
                    conds: Vec::new(),
                    set_clauses: Vec::new(),
                    alias_map,
                    is_select_star,
                })
            }
        }
    }

    /// Logical then physical optimization for a SELECT.
    fn generate_select_plan(&self, mut query: Query, catalog: &Catalog) -> QueryResult<Plan> {
        self.logical_optimization(&mut query);
        self.physical_optimization(query, catalog)
    }

    // ------------------------------------------------------------------
    // Logical optimization
    // ------------------------------------------------------------------

    fn logical_optimization(&self, query: &mut Query) {
        self.predicate_pushdown(query);
        self.projection_pushdown(query);
        self.join_order_optimization(query);
    }

    /// Predicate pushdown is realized structurally during physical
    /// planning (`pop_conds` and the Filter insertion pass); the logical
    /// pass has nothing left to rewrite.
    fn predicate_pushdown(&self, _query: &mut Query) {}

    /// Collects the columns the plan actually needs: the projection, the
    /// columns referenced by any condition, and the ORDER BY keys.
    fn projection_pushdown(&self, query: &Query) -> BTreeSet<TabCol> {
        let mut required: BTreeSet<TabCol> = query.cols.iter().cloned().collect();
        for cond in &query.conds {
            required.insert(cond.lhs.clone());
            if let Some(rhs) = cond.rhs_col() {
                required.insert(rhs.clone());
            }
        }
        if let Statement::Select(select) | Statement::Explain(select) = &query.stmt {
            for item in &select.order_by {
                required.insert(TabCol::new(
                    item.col.table.clone().unwrap_or_default(),
                    &item.col.column,
                ));
            }
        }
        trace!(?required, "projection pushdown column set");
        required
    }

    /// Greedily reorders the table list ascending by estimated
    /// cardinality. With uniform estimates the stable sort is a no-op,
    /// keeping plans deterministic.
    fn join_order_optimization(&self, query: &mut Query) {
        if query.tables.len() < 3 {
            return;
        }
        query
            .tables
            .sort_by_key(|table| self.estimated_cardinality(table));
    }

    fn estimated_cardinality(&self, _table: &str) -> u64 {
        DEFAULT_CARDINALITY
    }

    // ------------------------------------------------------------------
    // Physical optimization
    // ------------------------------------------------------------------

    fn physical_optimization(&self, query: Query, catalog: &Catalog) -> QueryResult<Plan> {
        let Query {
            stmt,
            tables,
            cols,
            conds,
            alias_map,
            ..
        } = query;
        let select = match &stmt {
            Statement::Select(select) | Statement::Explain(select) => select.clone(),
            _ => {
                return Err(QueryError::Internal(
                    "physical optimization on a non-select".to_string(),
                ))
            }
        };

        let plan = self.make_one_rel(&tables, conds, catalog)?;
        let plan = push_filters_down(plan);
        let plan = self.generate_sort_plan(&select, plan, &tables, &alias_map, catalog)?;
        Ok(Plan::Project {
            child: Box::new(plan),
            cols,
        })
    }

    /// Builds the scan/join tree covering every referenced table.
    fn make_one_rel(
        &self,
        tables: &[String],
        mut conds: Vec<Condition>,
        catalog: &Catalog,
    ) -> QueryResult<Plan> {
        // Per-table access paths, with single-table predicates popped off
        // the shared pool.
        let mut scans: Vec<Option<Plan>> = Vec::with_capacity(tables.len());
        for table in tables {
            let table_conds = pop_conds(&mut conds, table);
            let index_cols = self.get_index_cols(catalog, table, &table_conds)?;
            let scan = if index_cols.is_empty() {
                Plan::seq_scan(table.clone(), table_conds)
            } else {
                debug!(table, ?index_cols, "chose index scan");
                Plan::index_scan(table.clone(), table_conds, index_cols)
            };
            scans.push(Some(scan));
        }

        if tables.len() == 1 {
            return Ok(scans[0].take().expect("single scan present"));
        }

        let algo = self.join_algo()?;
        let mut joined: Vec<String> = Vec::new();
        let mut tree: Option<Plan> = None;

        if !conds.is_empty() {
            // The first cross-table predicate seeds the join tree.
            let first = conds.remove(0);
            let rhs_table = cross_rhs_table(&first)?.to_string();
            let left = pop_scan(&mut scans, tables, &first.lhs.tab_name, &mut joined)?;
            let right = pop_scan(&mut scans, tables, &rhs_table, &mut joined)?;
            tree = Some(Plan::Join {
                algo,
                left: Box::new(left),
                right: Box::new(right),
                conds: vec![first],
            });

            for mut cond in std::mem::take(&mut conds) {
                let rhs_table = cross_rhs_table(&cond)?.to_string();
                let lhs_joined = joined.contains(&cond.lhs.tab_name);
                let rhs_joined = joined.contains(&rhs_table);
                let current = tree.take().expect("join tree seeded");
                let next = match (lhs_joined, rhs_joined) {
                    (true, true) => {
                        // Both operands already joined: push the predicate
                        // into the existing tree.
                        let mut current = current;
                        push_conds(&mut cond, &mut current);
                        current
                    }
                    (false, true) => {
                        // The left operand's table is the new one: flip
                        // the condition so its lhs resolves in the
                        // existing (left) subtree, then bring the new
                        // scan in on the right.
                        cond.swap_sides();
                        let new_table = cross_rhs_table(&cond)?.to_string();
                        let scan = pop_scan(&mut scans, tables, &new_table, &mut joined)?;
                        Plan::Join {
                            algo,
                            left: Box::new(current),
                            right: Box::new(scan),
                            conds: vec![cond],
                        }
                    }
                    (true, false) => {
                        let scan = pop_scan(&mut scans, tables, &rhs_table, &mut joined)?;
                        Plan::Join {
                            algo,
                            left: Box::new(current),
                            right: Box::new(scan),
                            conds: vec![cond],
                        }
                    }
                    (false, false) => {
                        // Two fresh tables: join them on the predicate,
                        // then cross-join the pair onto the tree.
                        let left =
                            pop_scan(&mut scans, tables, &cond.lhs.tab_name, &mut joined)?;
                        let right = pop_scan(&mut scans, tables, &rhs_table, &mut joined)?;
                        let pair = Plan::Join {
                            algo,
                            left: Box::new(left),
                            right: Box::new(right),
                            conds: vec![cond],
                        };
                        Plan::Join {
                            algo,
                            left: Box::new(current),
                            right: Box::new(pair),
                            conds: Vec::new(),
                        }
                    }
                };
                tree = Some(next);
            }
        } else {
            joined.push(tables[0].clone());
            tree = Some(scans[0].take().expect("first scan present"));
        }

        // Cross-join any scans the predicates never reached.
        let mut tree = tree.expect("join tree built");
        for scan in scans.iter_mut() {
            if let Some(scan) = scan.take() {
                tree = Plan::Join {
                    algo,
                    left: Box::new(tree),
                    right: Box::new(scan),
                    conds: Vec::new(),
                };
            }
        }
        Ok(tree)
    }

    /// Chooses the join algorithm from the session knobs.
    fn join_algo(&self) -> QueryResult<JoinAlgo> {
        match (self.enable_nestloop, self.enable_sortmerge) {
            (true, _) => Ok(JoinAlgo::NestLoop),
            (false, true) => Ok(JoinAlgo::SortMerge),
            (false, false) => Err(QueryError::NoJoinAlgorithm),
        }
    }

    /// Chooses the index columns for a table given its popped predicates.
    ///
    /// Collects every column compared against a literal, prefers a
    /// single-column index on any of them, and otherwise accepts a
    /// composite index whose signature equals the collected set. NE
    /// nominates a column here but never narrows the scan range.
    fn get_index_cols(
        &self,
        catalog: &Catalog,
        table: &str,
        conds: &[Condition],
    ) -> QueryResult<Vec<String>> {
        let mut collected: BTreeSet<String> = BTreeSet::new();
        for cond in conds {
            if cond.is_rhs_value() && cond.lhs.tab_name == table {
                collected.insert(cond.lhs.col_name.clone());
            }
        }
        if collected.is_empty() {
            return Ok(Vec::new());
        }
        let meta = catalog.get_table(table)?;
        for col in &collected {
            let single = vec![col.clone()];
            if meta.is_index(&single) {
                return Ok(single);
            }
        }
        let all: Vec<String> = collected.into_iter().collect();
        if meta.is_index(&all) {
            return Ok(all);
        }
        Ok(Vec::new())
    }

    /// Access-path selection for the scan beneath UPDATE/DELETE.
    fn build_dml_scan(
        &self,
        catalog: &Catalog,
        table: &str,
        conds: Vec<Condition>,
    ) -> QueryResult<Plan> {
        let index_cols = self.get_index_cols(catalog, table, &conds)?;
        Ok(if index_cols.is_empty() {
            Plan::seq_scan(table, conds)
        } else {
            Plan::index_scan(table, conds, index_cols)
        })
    }

    /// Wraps the plan in a Sort node when the statement has ORDER BY.
    fn generate_sort_plan(
        &self,
        select: &SelectStmt,
        plan: Plan,
        tables: &[String],
        alias_map: &HashMap<String, String>,
        catalog: &Catalog,
    ) -> QueryResult<Plan> {
        if select.order_by.is_empty() {
            return Ok(plan);
        }
        let mut cols = Vec::with_capacity(select.order_by.len());
        let mut desc = Vec::with_capacity(select.order_by.len());
        for item in &select.order_by {
            cols.push(self.resolve_sort_col(item, tables, alias_map, catalog)?);
            desc.push(item.desc);
        }
        Ok(Plan::Sort {
            child: Box::new(plan),
            cols,
            desc,
        })
    }

    /// Resolves one ORDER BY key against the visible columns; for a bare
    /// name the first match in table order wins.
    fn resolve_sort_col(
        &self,
        item: &OrderByItem,
        tables: &[String],
        alias_map: &HashMap<String, String>,
        catalog: &Catalog,
    ) -> QueryResult<TabCol> {
        if let Some(qualifier) = &item.col.table {
            let real = alias_map
                .get(qualifier)
                .cloned()
                .unwrap_or_else(|| qualifier.clone());
            let meta = catalog.get_table(&real)?;
            if meta.get_col(&item.col.column).is_none() {
                return Err(QueryError::ColumnNotFound(format!(
                    "{}.{}",
                    qualifier, item.col.column
                )));
            }
            return Ok(TabCol::new(real, &item.col.column));
        }
        for table in tables {
            if catalog.get_table(table)?.get_col(&item.col.column).is_some() {
                return Ok(TabCol::new(table, &item.col.column));
            }
        }
        Err(QueryError::ColumnNotFound(item.col.column.clone()))
    }
}

/// Pops every predicate a scan of `table` can evaluate by itself: a
/// literal comparison on `table`, or a column-vs-column comparison whose
/// operands both live in `table`.
fn pop_conds(conds: &mut Vec<Condition>, table: &str) -> Vec<Condition> {
    let mut taken = Vec::new();
    let mut rest = Vec::new();
    for cond in conds.drain(..) {
        let single_table = cond.lhs.tab_name == table
            && match cond.rhs_col() {
                None => true,
                Some(rhs) => rhs.tab_name == table,
            };
        if single_table {
            taken.push(cond);
        } else {
            rest.push(cond);
        }
    }
    *conds = rest;
    taken
}

/// Takes the scan of `table` out of the pending list, marking it joined.
fn pop_scan(
    scans: &mut [Option<Plan>],
    tables: &[String],
    table: &str,
    joined: &mut Vec<String>,
) -> QueryResult<Plan> {
    for (i, name) in tables.iter().enumerate() {
        if name == table {
            if let Some(scan) = scans[i].take() {
                joined.push(name.clone());
                return Ok(scan);
            }
        }
    }
    Err(QueryError::Internal(format!(
        "scan for table {} consumed twice",
        table
    )))
}

/// The table of the right-hand column of a cross-table predicate.
fn cross_rhs_table(cond: &Condition) -> QueryResult<&str> {
    cond.rhs_col()
        .map(|col| col.tab_name.as_str())
        .ok_or_else(|| {
            QueryError::Internal("literal predicate survived pop_conds".to_string())
        })
}

/// Pushes a predicate whose operands are both inside `plan` down to the
/// deepest join that sees both sides.
///
/// Returns 1 if only the left operand's table is in the subtree, 2 for
/// the right, 0 for neither, 3 once the predicate has been absorbed.
fn push_conds(cond: &mut Condition, plan: &mut Plan) -> u8 {
    match plan {
        Plan::Scan { table, .. } => {
            if *table == cond.lhs.tab_name {
                1
            } else if cond.rhs_col().is_some_and(|rhs| *table == rhs.tab_name) {
                2
            } else {
                0
            }
        }
        Plan::Join {
            left, right, conds, ..
        } => {
            let left_res = push_conds(cond, left);
            if left_res == 3 {
                return 3;
            }
            let right_res = push_conds(cond, right);
            if right_res == 3 {
                return 3;
            }
            if left_res == 0 || right_res == 0 {
                return left_res + right_res;
            }
            // The condition's lhs lives in the right subtree: flip it so
            // lhs always resolves on the left.
            if left_res == 2 {
                cond.swap_sides();
            }
            conds.push(cond.clone());
            3
        }
        _ => 0,
    }
}

/// Inserts Filter nodes: literal predicates move out of sequential scans
/// (and out of join condition lists) into explicit Filters. Index scans
/// keep their predicates — they drive the scan range.
fn push_filters_down(plan: Plan) -> Plan {
    match plan {
        Plan::Join {
            algo,
            left,
            right,
            conds,
        } => {
            let mut left = push_filters_down(*left);
            let mut right = push_filters_down(*right);
            let mut left_tables = BTreeSet::new();
            let mut right_tables = BTreeSet::new();
            left.collect_tables(&mut left_tables);
            right.collect_tables(&mut right_tables);

            let mut join_conds = Vec::new();
            for cond in conds {
                if cond.is_rhs_value() {
                    if left_tables.contains(&cond.lhs.tab_name) {
                        left = wrap_filter(left, cond);
                    } else if right_tables.contains(&cond.lhs.tab_name) {
                        right = wrap_filter(right, cond);
                    } else {
                        join_conds.push(cond);
                    }
                } else {
                    join_conds.push(cond);
                }
            }
            Plan::Join {
                algo,
                left: Box::new(left),
                right: Box::new(right),
                conds: join_conds,
            }
        }
        Plan::Scan {
            kind: ScanKind::Seq,
            table,
            conds,
            index_cols,
        } => {
            let (filter_conds, scan_conds): (Vec<Condition>, Vec<Condition>) =
                conds.into_iter().partition(Condition::is_rhs_value);
            let scan = Plan::Scan {
                kind: ScanKind::Seq,
                table,
                conds: scan_conds,
                index_cols,
            };
            if filter_conds.is_empty() {
                scan
            } else {
                Plan::Filter {
                    child: Box::new(scan),
                    conds: filter_conds,
                }
            }
        }
        other => other,
    }
}

fn wrap_filter(plan: Plan, cond: Condition) -> Plan {
    match plan {
        Plan::Filter { child, mut conds } => {
            conds.push(cond);
            Plan::Filter { child, conds }
        }
        other => Plan::Filter {
            child: Box::new(other),
            conds: vec![cond],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::ast::{BinaryExpr, ColRef, Literal, SelectStmt, TableRef};
    use crate::catalog::TabMeta;
    use crate::types::{ColDef, CompOp, CondRhs, Value};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_table(TabMeta::from_defs("t", &[ColDef::int("x"), ColDef::int("z")]).unwrap())
            .unwrap();
        catalog
            .create_table(TabMeta::from_defs("u", &[ColDef::int("y")]).unwrap())
            .unwrap();
        catalog
            .create_table(TabMeta::from_defs("v", &[ColDef::int("w")]).unwrap())
            .unwrap();
        catalog
    }

    fn catalog_with_index() -> Catalog {
        let mut catalog = Catalog::new();
        let mut meta = TabMeta::from_defs("k", &[ColDef::int("x"), ColDef::int("y")]).unwrap();
        let col = meta.cols[0].clone();
        meta.cols[0].indexed = true;
        meta.indexes.push(crate::catalog::IndexMeta {
            tab_name: "k".into(),
            col_tot_len: 4,
            cols: vec![col],
        });
        catalog.create_table(meta).unwrap();
        catalog
    }

    fn plan_select(catalog: &Catalog, select: SelectStmt) -> Plan {
        let query = Analyzer::new(catalog)
            .analyze(Statement::Select(select))
            .unwrap();
        Planner::new().plan(query, catalog).unwrap()
    }

    fn select_root(plan: Plan) -> Plan {
        match plan {
            Plan::Dml {
                kind: DmlKind::Select,
                subplan: Some(subplan),
                ..
            } => *subplan,
            other => panic!("expected select wrapper, got {:?}", other),
        }
    }

    #[test]
    fn test_single_table_filter_shape() {
        // SELECT x FROM t WHERE x >= 2 -> Project(Filter(SeqScan)).
        let catalog = catalog();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
                cols: vec![ColRef::qualified("t", "x")],
                tables: vec![TableRef::new("t")],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("t", "x"),
                    CompOp::Ge,
                    Literal::Int(2),
                )],
                ..Default::default()
            },
        ));
        let Plan::Project { child, cols } = root else {
            panic!("root must be Project");
        };
        assert_eq!(cols, vec![TabCol::new("t", "x")]);
        let Plan::Filter { child, conds } = *child else {
            panic!("expected Filter above the scan");
        };
        assert_eq!(conds.len(), 1);
        assert!(matches!(
            *child,
            Plan::Scan {
                kind: ScanKind::Seq,
                ref conds,
                ..
            } if conds.is_empty()
        ));
    }

    #[test]
    fn test_index_scan_keeps_conds() {
        // An index on k.x absorbs range predicates into the scan itself.
        let catalog = catalog_with_index();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
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
            },
        ));
        let Plan::Project { child, .. } = root else {
            panic!("root must be Project");
        };
        let Plan::Scan {
            kind: ScanKind::Index,
            conds,
            index_cols,
            ..
        } = *child
        else {
            panic!("expected bare IndexScan, got {:?}", child);
        };
        assert_eq!(conds.len(), 2);
        assert_eq!(index_cols, vec!["x"]);
    }

    #[test]
    fn test_join_shape_and_pushdown() {
        // SELECT t.x, u.y FROM t, u WHERE t.x = u.y AND t.x > 1
        let catalog = catalog();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
                cols: vec![ColRef::qualified("t", "x"), ColRef::qualified("u", "y")],
                tables: vec![TableRef::new("t"), TableRef::new("u")],
                conds: vec![
                    BinaryExpr::with_col(
                        ColRef::qualified("t", "x"),
                        CompOp::Eq,
                        ColRef::qualified("u", "y"),
                    ),
                    BinaryExpr::with_literal(
                        ColRef::qualified("t", "x"),
                        CompOp::Gt,
                        Literal::Int(1),
                    ),
                ],
                ..Default::default()
            },
        ));
        let Plan::Project { child, .. } = root else {
            panic!("root must be Project");
        };
        let Plan::Join {
            left, right, conds, ..
        } = *child
        else {
            panic!("expected Join below Project");
        };
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].rhs_col(), Some(&TabCol::new("u", "y")));
        // t carries the literal predicate in a Filter; u is a bare scan.
        assert!(matches!(*left, Plan::Filter { .. }));
        assert!(matches!(
            *right,
            Plan::Scan { kind: ScanKind::Seq, ref table, .. } if table == "u"
        ));
    }

    #[test]
    fn test_swap_when_new_table_on_lhs() {
        // Conditions ordered so v.w = u.y arrives when u is joined and v
        // is not: the condition flips so the lhs stays on the left.
        let catalog = catalog();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
                cols: vec![ColRef::qualified("t", "x")],
                tables: vec![TableRef::new("t"), TableRef::new("u"), TableRef::new("v")],
                conds: vec![
                    BinaryExpr::with_col(
                        ColRef::qualified("t", "x"),
                        CompOp::Eq,
                        ColRef::qualified("u", "y"),
                    ),
                    BinaryExpr::with_col(
                        ColRef::qualified("v", "w"),
                        CompOp::Lt,
                        ColRef::qualified("u", "y"),
                    ),
                ],
                ..Default::default()
            },
        ));
        let Plan::Project { child, .. } = root else {
            panic!("root must be Project");
        };
        let Plan::Join {
            right, conds: outer, ..
        } = *child
        else {
            panic!("expected outer Join");
        };
        // The new table v sits on the right; the swapped condition reads
        // u.y > v.w so its lhs resolves in the left subtree.
        assert!(matches!(
            *right,
            Plan::Scan { ref table, .. } if table == "v"
        ));
        assert_eq!(outer[0].lhs, TabCol::new("u", "y"));
        assert_eq!(outer[0].op, CompOp::Gt);
        assert_eq!(outer[0].rhs_col(), Some(&TabCol::new("v", "w")));
    }

    #[test]
    fn test_push_conds_into_existing_tree() {
        // Both operands already joined: the predicate lands on the join.
        let catalog = catalog();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
                cols: vec![ColRef::qualified("t", "x")],
                tables: vec![TableRef::new("t"), TableRef::new("u")],
                conds: vec![
                    BinaryExpr::with_col(
                        ColRef::qualified("t", "x"),
                        CompOp::Eq,
                        ColRef::qualified("u", "y"),
                    ),
                    BinaryExpr::with_col(
                        ColRef::qualified("u", "y"),
                        CompOp::Le,
                        ColRef::qualified("t", "z"),
                    ),
                ],
                ..Default::default()
            },
        ));
        let Plan::Project { child, .. } = root else {
            panic!("root must be Project");
        };
        let Plan::Join { conds, .. } = *child else {
            panic!("expected Join");
        };
        assert_eq!(conds.len(), 2);
        // The second predicate flipped so its lhs is in the left subtree.
        assert_eq!(conds[1].lhs, TabCol::new("t", "z"));
        assert_eq!(conds[1].op, CompOp::Ge);
    }

    #[test]
    fn test_cartesian_product_without_conds() {
        let catalog = catalog();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
                cols: vec![ColRef::qualified("t", "x")],
                tables: vec![TableRef::new("t"), TableRef::new("u")],
                ..Default::default()
            },
        ));
        let Plan::Project { child, .. } = root else {
            panic!("root must be Project");
        };
        let Plan::Join { conds, .. } = *child else {
            panic!("expected cross Join");
        };
        assert!(conds.is_empty());
    }

    #[test]
    fn test_no_join_algorithm() {
        let catalog = catalog();
        let query = Analyzer::new(&catalog)
            .analyze(Statement::Select(SelectStmt {
                cols: vec![ColRef::qualified("t", "x")],
                tables: vec![TableRef::new("t"), TableRef::new("u")],
                ..Default::default()
            }))
            .unwrap();
        let planner = Planner {
            enable_nestloop: false,
            enable_sortmerge: false,
        };
        assert!(matches!(
            planner.plan(query, &catalog),
            Err(QueryError::NoJoinAlgorithm)
        ));
    }

    #[test]
    fn test_sort_sits_below_project() {
        let catalog = catalog();
        let root = select_root(plan_select(
            &catalog,
            SelectStmt {
                cols: vec![ColRef::qualified("t", "x")],
                tables: vec![TableRef::new("t")],
                order_by: vec![OrderByItem {
                    col: ColRef::bare("z"),
                    desc: true,
                }],
                ..Default::default()
            },
        ));
        let Plan::Project { child, .. } = root else {
            panic!("root must be Project");
        };
        let Plan::Sort { cols, desc, .. } = *child else {
            panic!("expected Sort below Project");
        };
        assert_eq!(cols, vec![TabCol::new("t", "z")]);
        assert_eq!(desc, vec![true]);
    }

    #[test]
    fn test_update_plan_uses_index() {
        let catalog = catalog_with_index();
        let query = Analyzer::new(&catalog)
            .analyze(Statement::Update {
                table: "k".into(),
                set_clauses: vec![crate::ast::AstSetClause {
                    column: "y".into(),
                    value: Literal::Int(0),
                }],
                conds: vec![BinaryExpr::with_literal(
                    ColRef::qualified("k", "x"),
                    CompOp::Eq,
                    Literal::Int(5),
                )],
            })
            .unwrap();
        let plan = Planner::new().plan(query, &catalog).unwrap();
        let Plan::Dml {
            kind: DmlKind::Update,
            subplan: Some(subplan),
            ..
        } = plan
        else {
            panic!("expected update wrapper");
        };
        assert!(matches!(
            *subplan,
            Plan::Scan {
                kind: ScanKind::Index,
                ..
            }
        ));
    }

    #[test]
    fn test_pop_conds_takes_single_table_only() {
        let mut conds = vec![
            Condition::with_value(TabCol::new("t", "x"), CompOp::Eq, Value::Int(1)),
            Condition::with_col(TabCol::new("t", "x"), CompOp::Eq, TabCol::new("u", "y")),
            Condition::with_col(TabCol::new("t", "x"), CompOp::Lt, TabCol::new("t", "z")),
        ];
        let taken = pop_conds(&mut conds, "t");
        assert_eq!(taken.len(), 2);
        assert_eq!(conds.len(), 1);
        assert!(matches!(conds[0].rhs, CondRhs::Col(_)));
    }

    #[test]
    fn test_ne_never_selects_nothing_but_counts() {
        // NE participates in index column collection.
        let catalog = catalog_with_index();
        let conds = vec![Condition::with_value(
            TabCol::new("k", "x"),
            CompOp::Ne,
            Value::Int(1),
        )];
        let cols = Planner::new()
            .get_index_cols(&catalog, "k", &conds)
            .unwrap();
        assert_eq!(cols, vec!["x"]);
    }
}
