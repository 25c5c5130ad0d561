//! Semantic analysis: AST -> resolved [`Query`].
//!
//! The analyzer checks every table and column reference against the
//! catalog, rewrites aliases to real table names, expands `SELECT *`,
//! normalizes WHERE / JOIN ON predicates (coercing literals to the left
//! column's type), and type-checks UPDATE assignments. Downstream stages
//! only ever see real table names.

use std::collections::HashMap;

use crate::ast::{
    BinaryExpr, ColRef, Literal, Operand, SelectStmt, Statement, TableRef,
};
use crate::catalog::{Catalog, ColMeta};
use crate::error::{QueryError, QueryResult};
use crate::types::{Condition, CondRhs, SetClause, TabCol, Value};

/// The resolved output of semantic analysis.
#[derive(Debug)]
pub struct Query {
    /// The original statement, kept for the planner's dispatch.
    pub stmt: Statement,
    /// Referenced tables, FROM order then JOIN order.
    pub tables: Vec<String>,
    /// Projection columns (real table names), expanded for `SELECT *`.
    pub cols: Vec<TabCol>,
    /// Resolved conditions: WHERE first, then JOIN ON.
    pub conds: Vec<Condition>,
    /// Resolved SET assignments (UPDATE only).
    pub set_clauses: Vec<SetClause>,
    /// Typed INSERT values (INSERT only).
    pub values: Vec<Value>,
    /// Maps every alias and every real name onto the real table name.
    pub alias_map: HashMap<String, String>,
    /// True when the projection list was empty (`SELECT *`).
    pub is_select_star: bool,
}

impl Query {
    fn empty(stmt: Statement) -> Self {
        Self {
            stmt,
            tables: Vec::new(),
            cols: Vec::new(),
            conds: Vec::new(),
            set_clauses: Vec::new(),
            values: Vec::new(),
            alias_map: HashMap::new(),
            is_select_star: false,
        }
    }
}

/// Semantic analyzer over a catalog.
#[derive(Debug)]
pub struct Analyzer<'a> {
    catalog: &'a Catalog,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer reading from `catalog`.
    #[must_use]
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Analyzes a statement into a resolved [`Query`].
    pub fn analyze(&self, stmt: Statement) -> QueryResult<Query> {
        match &stmt {
            Statement::Select(select) | Statement::Explain(select) => {
                let select = select.clone();
                self.analyze_select(stmt.clone(), &select)
            }
            Statement::Update {
                table,
                set_clauses,
                conds,
            } => {
                let (table, set_clauses, conds) =
                    (table.clone(), set_clauses.clone(), conds.clone());
                self.analyze_update(stmt, &table, &set_clauses, &conds)
            }
            Statement::Delete { table, conds } => {
                let (table, conds) = (table.clone(), conds.clone());
                self.analyze_delete(stmt, &table, &conds)
            }
            Statement::Insert { values, .. } => {
                let values = values.clone();
                let mut query = Query::empty(stmt);
                for lit in &values {
                    query.values.push(literal_value(lit)?);
                }
                Ok(query)
            }
            // DDL and utility statements carry no names to resolve beyond
            // what their executors check against the catalog.
            _ => Ok(Query::empty(stmt)),
        }
    }

    fn analyze_select(&self, stmt: Statement, select: &SelectStmt) -> QueryResult<Query> {
        let mut query = Query::empty(stmt);

        // FROM tables, then JOIN right-tables not already referenced.
        for table_ref in &select.tables {
            query.tables.push(table_ref.table.clone());
        }
        for join in &select.joins {
            if !query.tables.contains(&join.right.table) {
                query.tables.push(join.right.table.clone());
            }
        }

        // Alias map over the FROM list and JOIN right-references.
        for table_ref in &select.tables {
            self.register_table_ref(&mut query.alias_map, table_ref)?;
        }
        for join in &select.joins {
            self.register_table_ref(&mut query.alias_map, &join.right)?;
        }

        let all_cols = self.all_cols(&query.tables)?;

        // Projection list; empty means SELECT *.
        if select.cols.is_empty() {
            query.is_select_star = true;
            for col in &all_cols {
                query.cols.push(TabCol::new(&col.tab_name, &col.name));
            }
        } else {
            for col_ref in &select.cols {
                query
                    .cols
                    .push(self.resolve_column(&all_cols, col_ref, &query.alias_map)?);
            }
        }

        // WHERE, then each JOIN's ON conditions.
        let mut conds = self.convert_clause(&select.conds, &all_cols, &query.alias_map)?;
        for join in &select.joins {
            conds.extend(self.convert_clause(&join.conds, &all_cols, &query.alias_map)?);
        }
        query.conds = conds;
        Ok(query)
    }

    fn analyze_update(
        &self,
        stmt: Statement,
        table: &str,
        set_clauses: &[crate::ast::AstSetClause],
        conds: &[BinaryExpr],
    ) -> QueryResult<Query> {
        let mut query = Query::empty(stmt);
        query.tables.push(table.to_string());
        if !self.catalog.is_table(table) {
            return Err(QueryError::TableNotFound(table.to_string()));
        }
        let meta = self.catalog.get_table(table)?;
        for clause in set_clauses {
            let col = meta.get_col(&clause.column).ok_or_else(|| {
                QueryError::ColumnNotFound(format!("{}.{}", table, clause.column))
            })?;
            let value = literal_value(&clause.value)?.cast_to(col.col_type)?;
            query.set_clauses.push(SetClause::new(
                TabCol::new(table, &clause.column),
                value,
            ));
        }
        let all_cols = self.all_cols(&query.tables)?;
        query.conds = self.convert_clause(conds, &all_cols, &query.alias_map)?;
        Ok(query)
    }

    fn analyze_delete(
        &self,
        stmt: Statement,
        table: &str,
        conds: &[BinaryExpr],
    ) -> QueryResult<Query> {
        let mut query = Query::empty(stmt);
        query.tables.push(table.to_string());
        if !self.catalog.is_table(table) {
            return Err(QueryError::TableNotFound(table.to_string()));
        }
        let all_cols = self.all_cols(&query.tables)?;
        query.conds = self.convert_clause(conds, &all_cols, &query.alias_map)?;
        Ok(query)
    }

    /// Records one table reference in the alias map. Both the alias (if
    /// any) and the real name map onto the real name.
    fn register_table_ref(
        &self,
        alias_map: &mut HashMap<String, String>,
        table_ref: &TableRef,
    ) -> QueryResult<()> {
        if !self.catalog.is_table(&table_ref.table) {
            return Err(QueryError::TableNotFound(table_ref.table.clone()));
        }
        if let Some(alias) = &table_ref.alias {
            if alias_map.contains_key(alias) {
                return Err(QueryError::DuplicateAlias(alias.clone()));
            }
            alias_map.insert(alias.clone(), table_ref.table.clone());
        }
        // The real name maps to itself, unless some alias already claimed
        // the name for a different table.
        if let Some(existing) = alias_map.get(&table_ref.table) {
            if existing != &table_ref.table {
                return Err(QueryError::DuplicateAlias(table_ref.table.clone()));
            }
        }
        alias_map.insert(table_ref.table.clone(), table_ref.table.clone());
        Ok(())
    }

    /// The columns of all referenced tables, table order then column order.
    fn all_cols(&self, tables: &[String]) -> QueryResult<Vec<ColMeta>> {
        let mut all = Vec::new();
        for table in tables {
            all.extend(self.catalog.get_table(table)?.cols.iter().cloned());
        }
        Ok(all)
    }

    /// Resolves a parsed column reference to a real (table, column) pair.
    fn resolve_column(
        &self,
        all_cols: &[ColMeta],
        col_ref: &ColRef,
        alias_map: &HashMap<String, String>,
    ) -> QueryResult<TabCol> {
        match &col_ref.table {
            None => {
                // Infer the table from the column name; it must be unique.
                let mut found: Option<&ColMeta> = None;
                for col in all_cols {
                    if col.name == col_ref.column {
                        if found.is_some() {
                            return Err(QueryError::AmbiguousColumn(col_ref.column.clone()));
                        }
                        found = Some(col);
                    }
                }
                let col = found
                    .ok_or_else(|| QueryError::ColumnNotFound(col_ref.column.clone()))?;
                Ok(TabCol::new(&col.tab_name, &col.name))
            }
            Some(qualifier) => {
                let real = alias_map
                    .get(qualifier)
                    .cloned()
                    .unwrap_or_else(|| qualifier.clone());
                let exists = all_cols
                    .iter()
                    .any(|c| c.tab_name == real && c.name == col_ref.column);
                if !exists {
                    return Err(QueryError::ColumnNotFound(format!(
                        "{}.{}",
                        qualifier, col_ref.column
                    )));
                }
                Ok(TabCol::new(real, &col_ref.column))
            }
        }
    }

    /// Resolves and type-checks a clause of parsed predicates.
    fn convert_clause(
        &self,
        exprs: &[BinaryExpr],
        all_cols: &[ColMeta],
        alias_map: &HashMap<String, String>,
    ) -> QueryResult<Vec<Condition>> {
        let mut conds = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let lhs = self.resolve_column(all_cols, &expr.lhs, alias_map)?;
            let lhs_meta = find_col(all_cols, &lhs)?;
            let rhs = match &expr.rhs {
                Operand::Literal(lit) => {
                    // Coerce the literal to the left column's type; the
                    // raw-bytes view is produced on demand from the typed
                    // value at the column's length.
                    let value = literal_value(lit)?.cast_to(lhs_meta.col_type)?;
                    if let Value::Str(s) = &value {
                        if s.len() > lhs_meta.len {
                            return Err(QueryError::StringOverflow {
                                len: s.len(),
                                width: lhs_meta.len,
                            });
                        }
                    }
                    CondRhs::Value(value)
                }
                Operand::Col(col_ref) => {
                    let rhs = self.resolve_column(all_cols, col_ref, alias_map)?;
                    let rhs_meta = find_col(all_cols, &rhs)?;
                    let compatible = lhs_meta.col_type == rhs_meta.col_type
                        || (lhs_meta.col_type.is_numeric() && rhs_meta.col_type.is_numeric());
                    if !compatible {
                        return Err(QueryError::IncompatibleType {
                            lhs: lhs_meta.col_type.to_string(),
                            rhs: rhs_meta.col_type.to_string(),
                        });
                    }
                    CondRhs::Col(rhs)
                }
            };
            conds.push(Condition {
                lhs,
                op: expr.op,
                rhs,
            });
        }
        Ok(conds)
    }
}

/// Converts a parsed literal into a typed runtime value.
fn literal_value(lit: &Literal) -> QueryResult<Value> {
    match lit {
        Literal::Int(v) => Ok(Value::Int(*v)),
        Literal::Float(v) => Ok(Value::Float(*v)),
        Literal::Str(s) => Ok(Value::Str(s.clone())),
        Literal::Bool(_) => Err(QueryError::Internal(
            "boolean literal outside SET statement".to_string(),
        )),
    }
}

fn find_col<'a>(all_cols: &'a [ColMeta], col: &TabCol) -> QueryResult<&'a ColMeta> {
    all_cols
        .iter()
        .find(|c| c.matches(col))
        .ok_or_else(|| QueryError::ColumnNotFound(col.to_string()))
}
