//! Predicate evaluation over raw rows.
//!
//! `read_value` is the single place that interprets column bytes
//! (endianness and NUL-trimming); every executor that needs a typed view
//! of a row goes through it. `eval_conds` short-circuits on the first
//! failing condition.

use std::cmp::Ordering;

use crate::catalog::ColMeta;
use crate::error::{QueryError, QueryResult};
use crate::types::{ColumnType, Condition, CondRhs, TabCol, Value};

/// Finds a column in a schema by (table, name).
pub fn get_col<'a>(schema: &'a [ColMeta], target: &TabCol) -> QueryResult<&'a ColMeta> {
    schema
        .iter()
        .find(|col| col.matches(target))
        .ok_or_else(|| QueryError::ColumnNotFound(target.to_string()))
}

/// Reads the typed value of a column out of a row buffer.
///
/// Numerics decode little-endian at the column's offset; strings are
/// trimmed at their first NUL within the declared length.
pub fn read_value(row: &[u8], col: &ColMeta) -> Value {
    let bytes = &row[col.offset..col.offset + col.len];
    match col.col_type {
        ColumnType::Int => Value::Int(i32::from_le_bytes(bytes[..4].try_into().unwrap())),
        ColumnType::Float => Value::Float(f32::from_le_bytes(bytes[..4].try_into().unwrap())),
        ColumnType::Str => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
    }
}

/// Compares two typed values.
///
/// Int-int compares as `i32`; any other numeric pair promotes to `f32`.
/// Strings compare on their NUL-trimmed bytes. Mixing a string with a
/// numeric is a type error.
pub fn compare_values(lhs: &Value, rhs: &Value) -> QueryResult<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
        _ => {
            let a = as_f32(lhs)?;
            let b = as_f32(rhs)?;
            Ok(a.total_cmp(&b))
        }
    }
}

fn as_f32(value: &Value) -> QueryResult<f32> {
    match value {
        Value::Int(v) => Ok(*v as f32),
        Value::Float(v) => Ok(*v),
        Value::Str(_) => Err(QueryError::IncompatibleType {
            lhs: ColumnType::Str.to_string(),
            rhs: "numeric".to_string(),
        }),
    }
}

/// Evaluates one condition against a row.
pub fn eval_cond(schema: &[ColMeta], cond: &Condition, row: &[u8]) -> QueryResult<bool> {
    let lhs_col = get_col(schema, &cond.lhs)?;
    let lhs = read_value(row, lhs_col);
    let rhs = match &cond.rhs {
        CondRhs::Value(value) => value.clone(),
        CondRhs::Col(col_ref) => {
            let rhs_col = get_col(schema, col_ref)?;
            read_value(row, rhs_col)
        }
    };
    let compatible = lhs.column_type() == rhs.column_type()
        || (lhs.column_type().is_numeric() && rhs.column_type().is_numeric());
    if !compatible {
        return Err(QueryError::IncompatibleType {
            lhs: lhs.column_type().to_string(),
            rhs: rhs.column_type().to_string(),
        });
    }
    Ok(cond.op.matches(compare_values(&lhs, &rhs)?))
}

/// Evaluates a conjunction, short-circuiting on the first false.
pub fn eval_conds(schema: &[ColMeta], conds: &[Condition], row: &[u8]) -> QueryResult<bool> {
    for cond in conds {
        if !eval_cond(schema, cond, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}
