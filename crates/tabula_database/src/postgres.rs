//! PostgreSQL backend.
//!
//! Plans are rendered with [`SqlRenderer`] and executed through
//! `diesel::sql_query` with every parameter bound. Rows come back as
//! `row_to_json` text so any table shape can be loaded without a schema.

use crate::PgPool;
use async_trait::async_trait;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Bool, Date, Double, Jsonb, Text, Timestamp};
use serde_json::Value;
use tabula_core::Row;
use tabula_error::{DatabaseError, DatabaseErrorKind, DatabaseResult, TabulaResult};
use tabula_interface::TableConnection;
use tabula_query::{
    CountPlan, Dialect, MutationPlan, SelectPlan, SqlRenderer, SqlValue, Statement,
};
use tracing::{debug, instrument};

/// Table connection over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgTableConnection {
    pool: PgPool,
    renderer: SqlRenderer,
}

impl std::fmt::Debug for PgTableConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTableConnection")
            .field("pool_size", &self.pool.max_size())
            .finish()
    }
}

impl PgTableConnection {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            renderer: SqlRenderer::new(Dialect::Postgres),
        }
    }

    /// Runs blocking diesel work on a pooled connection.
    async fn with_conn<T, F>(&self, work: F) -> DatabaseResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> DatabaseResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;
            work(&mut *conn)
        })
        .await
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Query(format!("Task join error: {}", e))))?
    }
}

/// Helper struct for deserializing row_to_json results.
#[derive(QueryableByName)]
struct StringRow {
    #[diesel(sql_type = Text)]
    row_to_json: String,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

fn bound(statement: Statement) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
    let mut query = diesel::sql_query(statement.sql).into_boxed::<Pg>();
    for param in statement.params {
        query = match param {
            SqlValue::Null => query,
            SqlValue::Bool(b) => query.bind::<Bool, _>(b),
            SqlValue::Int(i) => query.bind::<BigInt, _>(i),
            SqlValue::Float(f) => query.bind::<Double, _>(f),
            SqlValue::Text(s) => query.bind::<Text, _>(s),
            SqlValue::Date(d) => query.bind::<Date, _>(d),
            SqlValue::DateTime(dt) => query.bind::<Timestamp, _>(dt),
            SqlValue::Json(v) => query.bind::<Jsonb, _>(v),
        };
    }
    query
}

fn as_json_rows(statement: Statement) -> Statement {
    Statement {
        sql: format!(
            "SELECT row_to_json(t)::text AS row_to_json FROM ({}) t",
            statement.sql
        ),
        params: statement.params,
    }
}

fn parse_row(row: StringRow) -> DatabaseResult<Row> {
    match serde_json::from_str::<Value>(&row.row_to_json)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "expected a JSON object row, got {}",
            other
        )))),
    }
}

/// Executes a mutation inside one transaction, returning record keys.
fn execute_mutation(
    conn: &mut PgConnection,
    renderer: SqlRenderer,
    plan: &MutationPlan,
) -> DatabaseResult<Vec<Value>> {
    conn.transaction::<_, DatabaseError, _>(|conn| match plan {
        MutationPlan::Insert(insert) => {
            let alias = insert.primary_key().alias().clone();
            renderer
                .insert(insert)
                .into_iter()
                .map(|statement| -> DatabaseResult<Value> {
                    let statement = Statement {
                        sql: format!(
                            "WITH inserted AS ({}) SELECT row_to_json(inserted)::text AS row_to_json FROM inserted",
                            statement.sql
                        ),
                        params: statement.params,
                    };
                    let row = parse_row(bound(statement).get_result::<StringRow>(conn)?)?;
                    Ok(row.get(&alias).cloned().unwrap_or(Value::Null))
                })
                .collect()
        }
        MutationPlan::Update(update) => {
            for statement in renderer.update(update) {
                bound(statement).execute(conn)?;
            }
            Ok(update.rows().iter().map(|r| r.key.to_json()).collect())
        }
        MutationPlan::Delete(delete) => {
            for statement in renderer.delete(delete) {
                bound(statement).execute(conn)?;
            }
            Ok(delete.keys().iter().map(SqlValue::to_json).collect())
        }
    })
}

#[async_trait]
impl TableConnection for PgTableConnection {
    #[instrument(skip(self, plan), fields(table = %plan.table()))]
    async fn select(&self, plan: &SelectPlan) -> TabulaResult<Vec<Row>> {
        let statement = as_json_rows(self.renderer.select(plan));
        let rows = self
            .with_conn(move |conn| {
                bound(statement)
                    .load::<StringRow>(conn)?
                    .into_iter()
                    .map(parse_row)
                    .collect::<DatabaseResult<Vec<_>>>()
            })
            .await?;
        debug!(rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, plan), fields(table = %plan.table()))]
    async fn count(&self, plan: &CountPlan) -> TabulaResult<u64> {
        let statement = self.renderer.count(plan);
        let count = self
            .with_conn(move |conn| Ok(bound(statement).get_result::<CountRow>(conn)?.count))
            .await?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, plan), fields(table = %plan.table(), records = plan.len()))]
    async fn mutate(&self, plan: &MutationPlan) -> TabulaResult<Vec<Value>> {
        let renderer = self.renderer;
        let plan = plan.clone();
        let keys = self
            .with_conn(move |conn| execute_mutation(conn, renderer, &plan))
            .await?;
        debug!(affected = keys.len(), "Applied mutation");
        Ok(keys)
    }
}
