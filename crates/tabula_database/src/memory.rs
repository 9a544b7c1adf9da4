//! In-memory backend evaluating query plans directly.
//!
//! Rows are stored keyed by physical column name. Predicates follow SQL
//! three-valued logic and NULLs sort after every value, matching PostgreSQL,
//! so results agree with the SQL backend.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tabula_core::{Row, SortDirection};
use tabula_error::{DatabaseError, DatabaseErrorKind, DatabaseResult, TabulaResult};
use tabula_interface::TableConnection;
use tabula_query::{
    ColumnRef, CompareOp, CountPlan, MatchKind, MutationPlan, Predicate, SelectPlan,
    SqlValue,
};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// In-memory table store.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl MemoryConnection {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or empties) a table.
    pub async fn create_table(&self, table_name: impl Into<String>) {
        self.tables.write().await.insert(table_name.into(), Vec::new());
    }

    /// Appends raw rows, keyed by physical column name, creating the table
    /// if needed.
    pub async fn seed<I>(&self, table_name: &str, rows: I)
    where
        I: IntoIterator<Item = Row>,
    {
        self.tables
            .write()
            .await
            .entry(table_name.to_string())
            .or_default()
            .extend(rows);
    }

    /// Snapshot of a table's raw rows.
    pub async fn rows(&self, table_name: &str) -> Option<Vec<Row>> {
        self.tables.read().await.get(table_name).cloned()
    }
}

fn table_not_found(table: &str) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::TableNotFound(table.to_string()))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(true),
            "false" | "f" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Compares a stored value with an operand; `None` when either is NULL.
fn compare(stored: &Value, operand: &SqlValue) -> Option<Ordering> {
    if stored.is_null() {
        return None;
    }
    match operand {
        SqlValue::Null => None,
        SqlValue::Int(i) => number(stored)?.partial_cmp(&(*i as f64)),
        SqlValue::Float(f) => number(stored)?.partial_cmp(f),
        SqlValue::Bool(b) => Some(truthy(stored)?.cmp(b)),
        SqlValue::Json(v) => Some(if stored == v {
            Ordering::Equal
        } else {
            Ordering::Less
        }),
        other => {
            let rhs = match other.to_json() {
                Value::String(s) => s,
                v => v.to_string(),
            };
            Some(text(stored)?.as_str().cmp(rhs.as_str()))
        }
    }
}

/// Ordering used by `ORDER BY`: NULLs after every value.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

static NULL: Value = Value::Null;

fn field<'r>(row: &'r Row, column: &ColumnRef) -> &'r Value {
    row.get(column.name()).unwrap_or(&NULL)
}

/// Evaluates a predicate with SQL semantics; `None` is UNKNOWN.
fn eval(predicate: &Predicate, row: &Row) -> Option<bool> {
    match predicate {
        Predicate::Compare { column, op, value } => {
            let stored = field(row, column);
            if *op == CompareOp::Neq && stored.is_null() {
                return Some(true);
            }
            let ordering = compare(stored, value)?;
            Some(match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Neq => ordering != Ordering::Equal,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
            })
        }
        Predicate::Match {
            column,
            kind,
            text: needle,
            negated,
        } => {
            let Some(haystack) = text(field(row, column)) else {
                return negated.then_some(true);
            };
            let haystack = haystack.to_lowercase();
            let needle = needle.to_lowercase();
            let found = match kind {
                MatchKind::Contains => haystack.contains(&needle),
                MatchKind::Prefix => haystack.starts_with(&needle),
                MatchKind::Suffix => haystack.ends_with(&needle),
            };
            Some(found != *negated)
        }
        Predicate::Null { column, negated } => Some(field(row, column).is_null() != *negated),
        Predicate::Blank { column, negated } => {
            let blank = match field(row, column) {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                _ => false,
            };
            Some(blank != *negated)
        }
        Predicate::InList {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                return Some(*negated);
            }
            let stored = field(row, column);
            if stored.is_null() {
                return negated.then_some(true);
            }
            let found = values
                .iter()
                .any(|v| compare(stored, v) == Some(Ordering::Equal));
            Some(found != *negated)
        }
        Predicate::Contains {
            column,
            items,
            all,
            negated,
        } => {
            // Decided by the item list alone, as the SQL renderer does.
            if items.is_empty() {
                return Some(*all != *negated);
            }
            let Some(stored) = text(field(row, column)) else {
                return negated.then_some(true);
            };
            let options: Vec<&str> = stored.split(',').map(str::trim).collect();
            let present = |item: &String| options.contains(&item.as_str());
            let found = if *all {
                items.iter().all(present)
            } else {
                items.iter().any(present)
            };
            Some(found != *negated)
        }
        Predicate::All(children) => {
            let mut result = Some(true);
            for child in children {
                match eval(child, row) {
                    Some(false) => return Some(false),
                    None => result = None,
                    Some(true) => {}
                }
            }
            result
        }
        Predicate::Any(children) => {
            let mut result = Some(false);
            for child in children {
                match eval(child, row) {
                    Some(true) => return Some(true),
                    None => result = None,
                    Some(false) => {}
                }
            }
            result
        }
        Predicate::Not(inner) => eval(inner, row).map(|b| !b),
    }
}

fn matches(filter: Option<&Predicate>, row: &Row) -> bool {
    filter.is_none_or(|p| eval(p, row) == Some(true))
}

fn find_key(rows: &[Row], primary_key: &ColumnRef, key: &SqlValue) -> Option<usize> {
    rows.iter()
        .position(|row| compare(field(row, primary_key), key) == Some(Ordering::Equal))
}

/// Applies a mutation to a copy of the rows, returning the record keys.
fn apply(rows: &mut Vec<Row>, plan: &MutationPlan) -> DatabaseResult<Vec<Value>> {
    let pk = plan.primary_key();
    match plan {
        MutationPlan::Insert(insert) => {
            let mut keys = Vec::with_capacity(insert.rows().len());
            for assignments in insert.rows() {
                let mut row = Row::new();
                for assignment in assignments {
                    row.insert(assignment.column.name().clone(), assignment.value.to_json());
                }
                let key = match row.get(pk.name()).filter(|v| !v.is_null()) {
                    Some(key) => key.clone(),
                    None if *insert.generated_key() => {
                        let next = rows
                            .iter()
                            .filter_map(|r| number(field(r, pk)))
                            .fold(0.0_f64, f64::max) as i64
                            + 1;
                        row.insert(pk.name().clone(), Value::from(next));
                        Value::from(next)
                    }
                    None => {
                        return Err(DatabaseError::new(DatabaseErrorKind::Query(format!(
                            "null value in column \"{}\" violates not-null constraint",
                            pk.name()
                        ))));
                    }
                };
                let duplicate = rows.iter().any(|r| {
                    order_values(field(r, pk), &key) == Ordering::Equal && !key.is_null()
                });
                if duplicate {
                    return Err(DatabaseError::new(DatabaseErrorKind::Query(format!(
                        "duplicate key value violates unique constraint on \"{}\"",
                        pk.name()
                    ))));
                }
                rows.push(row);
                keys.push(key);
            }
            Ok(keys)
        }
        MutationPlan::Update(update) => {
            for keyed in update.rows() {
                if let Some(index) = find_key(rows, pk, &keyed.key) {
                    for assignment in &keyed.assignments {
                        rows[index].insert(assignment.column.name().clone(), assignment.value.to_json());
                    }
                }
            }
            Ok(update.rows().iter().map(|r| r.key.to_json()).collect())
        }
        MutationPlan::Delete(delete) => {
            for key in delete.keys() {
                if let Some(index) = find_key(rows, pk, key) {
                    rows.remove(index);
                }
            }
            Ok(delete.keys().iter().map(SqlValue::to_json).collect())
        }
    }
}

#[async_trait]
impl TableConnection for MemoryConnection {
    #[instrument(skip(self, plan), fields(table = %plan.table()))]
    async fn select(&self, plan: &SelectPlan) -> TabulaResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let rows = tables.get(plan.table()).ok_or_else(|| table_not_found(plan.table()))?;

        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| matches(plan.filter().as_ref(), row))
            .collect();
        matched.sort_by(|a, b| {
            plan.order()
                .iter()
                .map(|o| {
                    let ordering = order_values(field(a, &o.column), field(b, &o.column));
                    match o.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let (offset, limit) = plan
            .window()
            .as_ref()
            .map(|w| (*w.offset() as usize, *w.limit() as usize))
            .unwrap_or((0, usize::MAX));

        let out: Vec<Row> = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                plan.columns()
                    .iter()
                    .map(|c| (c.alias().clone(), field(row, c).clone()))
                    .collect()
            })
            .collect();
        debug!(rows = out.len(), "Selected rows");
        Ok(out)
    }

    #[instrument(skip(self, plan), fields(table = %plan.table()))]
    async fn count(&self, plan: &CountPlan) -> TabulaResult<u64> {
        let tables = self.tables.read().await;
        let rows = tables.get(plan.table()).ok_or_else(|| table_not_found(plan.table()))?;
        Ok(rows
            .iter()
            .filter(|row| matches(plan.filter().as_ref(), row))
            .count() as u64)
    }

    #[instrument(skip(self, plan), fields(table = %plan.table(), records = plan.len()))]
    async fn mutate(&self, plan: &MutationPlan) -> TabulaResult<Vec<Value>> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(plan.table())
            .ok_or_else(|| table_not_found(plan.table()))?;

        let mut staged = rows.clone();
        let keys = apply(&mut staged, plan)?;
        *rows = staged;
        debug!(affected = keys.len(), "Applied mutation");
        Ok(keys)
    }
}
