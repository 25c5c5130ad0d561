//! EXPLAIN plan rendering.
//!
//! Renders a physical plan as one line per node, preorder, with one tab
//! of indentation per depth level. Output is deterministic: condition
//! and column lists are sorted lexicographically, join table lists are
//! sorted, and a node's children are emitted ordered by their own
//! rendered label. Table names display through the query's alias map —
//! the alias when one is defined, the real name otherwise — except in
//! `Scan` and `Join` table lists, which always show real names.
//!
//! A formatting error in a node degrades to `Error: <msg>` for that
//! node; the rest of the tree still renders.

use std::collections::{BTreeSet, HashMap};

use onyx_storage::Record;

use crate::error::{QueryError, QueryResult};
use crate::plan::Plan;
use crate::types::{Condition, CondRhs, TabCol};

/// Renders the plan of an EXPLAIN statement.
#[derive(Debug)]
pub struct ExplainExec {
    plan: Plan,
    alias_map: HashMap<String, String>,
    is_select_star: bool,
}

impl ExplainExec {
    /// Builds the renderer for a plan with its display alias map.
    #[must_use]
    pub fn new(plan: Plan, alias_map: HashMap<String, String>, is_select_star: bool) -> Self {
        Self {
            plan,
            alias_map,
            is_select_star,
        }
    }

    /// Renders the plan tree as text, one trailing newline included.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(&self.plan, 0, &mut out);
        out
    }

    /// Renders the plan into the single result record: the text followed
    /// by a terminating NUL.
    #[must_use]
    pub fn record(&self) -> Record {
        let mut data = self.render().into_bytes();
        data.push(0);
        Record::new(data)
    }

    fn render_node(&self, plan: &Plan, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push('\t');
        }
        let label = self
            .node_label(plan)
            .unwrap_or_else(|e| format!("Error: {}", e));
        out.push_str(&label);
        out.push('\n');

        let mut children: Vec<&Plan> = match plan {
            Plan::Filter { child, .. } | Plan::Project { child, .. } | Plan::Sort { child, .. } => {
                vec![child]
            }
            Plan::Join { left, right, .. } => vec![left, right],
            _ => Vec::new(),
        };
        // Children appear ordered by their rendered labels; the sort is
        // stable so equal labels keep plan order.
        children.sort_by_key(|child| {
            self.node_label(child)
                .unwrap_or_else(|e| format!("Error: {}", e))
        });
        for child in children {
            self.render_node(child, depth + 1, out);
        }
    }

    fn node_label(&self, plan: &Plan) -> QueryResult<String> {
        match plan {
            Plan::Scan { table, .. } => Ok(format!("Scan(table={})", table)),
            Plan::Filter { conds, .. } => {
                let mut parts = self.format_conds(conds)?;
                parts.sort();
                Ok(format!("Filter(condition=[{}])", parts.join(",")))
            }
            Plan::Project { cols, .. } => {
                if self.is_select_star || cols.is_empty() {
                    return Ok("Project(columns=[*])".to_string());
                }
                let mut parts: Vec<String> =
                    cols.iter().map(|col| self.display_col(col)).collect();
                parts.sort();
                Ok(format!("Project(columns=[{}])", parts.join(",")))
            }
            Plan::Join { left, right, conds, .. } => {
                let mut tables = BTreeSet::new();
                left.collect_tables(&mut tables);
                right.collect_tables(&mut tables);
                let tables: Vec<String> = tables.into_iter().collect();
                let mut parts = self.format_conds(conds)?;
                parts.sort();
                Ok(format!(
                    "Join(tables=[{}],condition=[{}])",
                    tables.join(","),
                    parts.join(",")
                ))
            }
            Plan::Sort { cols, .. } => {
                let mut parts: Vec<String> =
                    cols.iter().map(|col| self.display_col(col)).collect();
                parts.sort();
                Ok(format!("Sort(columns=[{}])", parts.join(",")))
            }
            other => Err(QueryError::Internal(format!(
                "unexpected plan node in explain: {:?}",
                std::mem::discriminant(other)
            ))),
        }
    }

    fn format_conds(&self, conds: &[Condition]) -> QueryResult<Vec<String>> {
        conds.iter().map(|cond| self.format_cond(cond)).collect()
    }

    fn format_cond(&self, cond: &Condition) -> QueryResult<String> {
        let mut text = self.display_col(&cond.lhs);
        text.push_str(cond.op.symbol());
        match &cond.rhs {
            CondRhs::Value(value) => text.push_str(&value.to_string()),
            CondRhs::Col(col) => text.push_str(&self.display_col(col)),
        }
        Ok(text)
    }

    fn display_col(&self, col: &TabCol) -> String {
        format!("{}.{}", self.display_table(&col.tab_name), col.col_name)
    }

    /// The display name of a table: its alias when one is defined, the
    /// real name otherwise. With several aliases the smallest wins, so
    /// equal plans render identically.
    fn display_table(&self, table: &str) -> String {
        let mut aliases: Vec<&String> = self
            .alias_map
            .iter()
            .filter(|(alias, real)| *real == table && *alias != table)
            .map(|(alias, _)| alias)
            .collect();
        aliases.sort();
        aliases
            .first()
            .map_or_else(|| table.to_string(), |alias| (*alias).clone())
    }
}
