//! CRUD orchestration over metadata and connections.

use crate::{CountResponse, ListParams, ListResponse, OneOrMany};
use serde_json::Value;
use std::sync::Arc;
use tabula_core::{FilterNode, Row, Table, View};
use tabula_error::{
    ApiError, ApiErrorKind, DatabaseError, DatabaseErrorKind, QueryErrorKind, TabulaResult,
};
use tabula_interface::{ConnectionResolver, MetadataStore};
use tabula_query::{
    FieldResolver, FilterParse, MutationPlan, PageRequest, PaginationConfig, PlanBuilder,
    RequestParts, SelectPlan, overlay, parse_fields, parse_filter_lenient, parse_sort,
};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum MutationKind {
    Insert,
    Update,
    Delete,
}

/// Table API entry point.
///
/// Resolves the table and optional view, overlays the view's rules onto the
/// request, builds query plans and runs them on the base's connection. Every
/// call is independent; the service keeps no per-request state.
#[derive(Clone)]
pub struct TableService {
    metadata: Arc<dyn MetadataStore>,
    connections: Arc<dyn ConnectionResolver>,
    pagination: PaginationConfig,
}

impl std::fmt::Debug for TableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableService")
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

impl TableService {
    /// Creates a service.
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        connections: Arc<dyn ConnectionResolver>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            metadata,
            connections,
            pagination,
        }
    }

    /// Lists one page of rows with page metadata.
    ///
    /// The page and the total count run concurrently and are not wrapped in a
    /// shared transaction.
    ///
    /// # Errors
    ///
    /// - Not found: unknown table or view
    /// - Unprocessable: view of another table, offset past the last row
    /// - Database errors from the connection
    #[instrument(skip(self, params), fields(view = ?params.view_id))]
    pub async fn list(&self, table_id: &str, params: &ListParams) -> TabulaResult<ListResponse> {
        let (table, view) = self.resolve(table_id, params.view_id.as_deref()).await?;
        let query = overlay(&table, view.as_ref(), request_parts(params))?;
        let window = PageRequest::from_params(
            params.offset.as_deref(),
            params.limit.as_deref(),
            &self.pagination,
        );
        let builder = PlanBuilder::new(FieldResolver::hiding(&table, &query.hidden));
        let select = builder.select(&query, Some(window));
        let count = builder.count(&query);

        let connection = self.connections.connection(table.base_id()).await?;
        let (rows, total) = tokio::try_join!(connection.select(&select), connection.count(&count))?;
        let page_info = window.page_info(total)?;
        debug!(
            rows = rows.len(),
            total,
            offset = window.offset(),
            limit = window.limit(),
            "Listed rows"
        );
        Ok(ListResponse::new(rows, page_info))
    }

    /// First row the list pipeline yields, if any.
    ///
    /// # Errors
    ///
    /// Same as [`TableService::list`], except that offsets past the end give
    /// `None`.
    #[instrument(skip(self, params), fields(view = ?params.view_id))]
    pub async fn find_one(&self, table_id: &str, params: &ListParams) -> TabulaResult<Option<Row>> {
        let (table, view) = self.resolve(table_id, params.view_id.as_deref()).await?;
        let query = overlay(&table, view.as_ref(), request_parts(params))?;
        let window = PageRequest::from_params(params.offset.as_deref(), Some("1"), &self.pagination);
        let builder = PlanBuilder::new(FieldResolver::hiding(&table, &query.hidden));
        let select = builder.select(&query, Some(window));

        let connection = self.connections.connection(table.base_id()).await?;
        Ok(connection.select(&select).await?.into_iter().next())
    }

    /// Fetches one row by primary key.
    ///
    /// The view's hidden fields are removed from the row, but its filter does
    /// not apply: a key lookup names the row explicitly.
    ///
    /// # Errors
    ///
    /// Not found when the table, view or row does not exist; a key that
    /// cannot be a value of the key column counts as a missing row.
    #[instrument(skip(self))]
    pub async fn read(&self, table_id: &str, row_id: &str, view_id: Option<&str>) -> TabulaResult<Row> {
        self.fetch_by_key(table_id, row_id, view_id)
            .await?
            .ok_or_else(|| ApiError::not_found("row", row_id).into())
    }

    /// Whether a row with the key exists.
    ///
    /// # Errors
    ///
    /// Not found when the table or view does not exist.
    #[instrument(skip(self))]
    pub async fn exists(&self, table_id: &str, row_id: &str, view_id: Option<&str>) -> TabulaResult<bool> {
        Ok(self.fetch_by_key(table_id, row_id, view_id).await?.is_some())
    }

    /// Counts matching rows.
    ///
    /// Uses the same view overlay and filter handling as `list`.
    ///
    /// # Errors
    ///
    /// Not found for unknown table or view; unprocessable for a view of
    /// another table.
    #[instrument(skip(self))]
    pub async fn count(
        &self,
        table_id: &str,
        view_id: Option<&str>,
        filter: Option<&str>,
    ) -> TabulaResult<CountResponse> {
        let (table, view) = self.resolve(table_id, view_id).await?;
        let request = RequestParts {
            filter: filter.and_then(parse_where),
            ..RequestParts::default()
        };
        let query = overlay(&table, view.as_ref(), request)?;
        let plan = PlanBuilder::new(FieldResolver::hiding(&table, &query.hidden)).count(&query);

        let connection = self.connections.connection(table.base_id()).await?;
        let count = connection.count(&plan).await?;
        debug!(count, "Counted rows");
        Ok(CountResponse { count })
    }

    /// Inserts one record or a batch.
    ///
    /// Returns the primary key of every record in input order, in the shape
    /// of the payload. A batch is inserted all-or-nothing.
    ///
    /// # Errors
    ///
    /// Unprocessable when a value does not fit its column; database errors
    /// leave the table untouched.
    pub async fn insert(
        &self,
        table_id: &str,
        view_id: Option<&str>,
        body: OneOrMany<Row>,
    ) -> TabulaResult<OneOrMany<Row>> {
        self.mutate(MutationKind::Insert, table_id, view_id, body).await
    }

    /// Updates one record or a batch, each identified by its primary key.
    ///
    /// # Errors
    ///
    /// A record without its primary key rejects the whole batch before any
    /// row is written.
    pub async fn update(
        &self,
        table_id: &str,
        view_id: Option<&str>,
        body: OneOrMany<Row>,
    ) -> TabulaResult<OneOrMany<Row>> {
        self.mutate(MutationKind::Update, table_id, view_id, body).await
    }

    /// Deletes one record or a batch, each identified by its primary key.
    ///
    /// # Errors
    ///
    /// A record without its primary key rejects the whole batch before any
    /// row is deleted.
    pub async fn delete(
        &self,
        table_id: &str,
        view_id: Option<&str>,
        body: OneOrMany<Row>,
    ) -> TabulaResult<OneOrMany<Row>> {
        self.mutate(MutationKind::Delete, table_id, view_id, body).await
    }

    #[instrument(skip(self, body), fields(records = body.len()))]
    async fn mutate(
        &self,
        kind: MutationKind,
        table_id: &str,
        view_id: Option<&str>,
        body: OneOrMany<Row>,
    ) -> TabulaResult<OneOrMany<Row>> {
        let (table, view) = self.resolve(table_id, view_id).await?;
        let builder = PlanBuilder::new(FieldResolver::hiding(&table, hidden_of(view.as_ref())));
        let many = body.is_many();
        let records = body.into_vec();
        let plan = match kind {
            MutationKind::Insert => MutationPlan::Insert(builder.insert(&records)?),
            MutationKind::Update => MutationPlan::Update(builder.update(&records)?),
            MutationKind::Delete => MutationPlan::Delete(builder.delete(&records)?),
        };

        let keys = if plan.is_empty() {
            Vec::new()
        } else {
            let connection = self.connections.connection(table.base_id()).await?;
            connection.mutate(&plan).await?
        };
        if keys.len() != records.len() {
            return Err(DatabaseError::new(DatabaseErrorKind::Query(format!(
                "{} returned {} keys for {} records",
                kind,
                keys.len(),
                records.len()
            )))
            .into());
        }
        debug!(records = keys.len(), "Mutation applied");

        let key_title = plan.primary_key().alias().clone();
        let mut echoes: Vec<Row> = keys
            .into_iter()
            .map(|key| echo(&key_title, key))
            .collect();
        if many {
            Ok(OneOrMany::Many(echoes))
        } else {
            echoes.pop().map(OneOrMany::One).ok_or_else(|| {
                ApiError::new(ApiErrorKind::InvalidPayload("empty payload".to_string())).into()
            })
        }
    }

    async fn fetch_by_key(
        &self,
        table_id: &str,
        row_id: &str,
        view_id: Option<&str>,
    ) -> TabulaResult<Option<Row>> {
        let (table, view) = self.resolve(table_id, view_id).await?;
        let builder = PlanBuilder::new(FieldResolver::hiding(&table, hidden_of(view.as_ref())));
        let plan: SelectPlan = match builder.read(row_id, None) {
            Ok(plan) => plan,
            Err(e) if matches!(e.kind, QueryErrorKind::InvalidLiteral { .. }) => {
                debug!(row_id, "Key does not fit the key column");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let connection = self.connections.connection(table.base_id()).await?;
        Ok(connection.select(&plan).await?.into_iter().next())
    }

    async fn resolve(&self, table_id: &str, view_id: Option<&str>) -> TabulaResult<(Table, Option<View>)> {
        let table = self.metadata.get_table(table_id).await?;
        let Some(view_id) = view_id else {
            return Ok((table, None));
        };
        let view = self.metadata.get_view(view_id).await?;
        if !view.belongs_to(table.id()) {
            return Err(ApiError::new(ApiErrorKind::ViewTableMismatch {
                view: view.id().clone(),
                table: table.id().clone(),
            })
            .into());
        }
        Ok((table, Some(view)))
    }
}

fn hidden_of(view: Option<&View>) -> &[String] {
    view.map(|v| v.hidden().as_slice()).unwrap_or_default()
}

fn echo(key_title: &str, key: Value) -> Row {
    let mut row = Row::new();
    row.insert(key_title.to_string(), key);
    row
}

/// Parses a request filter, dropping malformed clauses.
fn parse_where(input: &str) -> Option<FilterNode> {
    let FilterParse { filter, errors } = parse_filter_lenient(input);
    for error in &errors {
        warn!(error = %error.kind, "Ignoring malformed filter clause");
    }
    filter
}

fn request_parts(params: &ListParams) -> RequestParts {
    RequestParts {
        fields: params
            .fields
            .clone()
            .map(|fields| parse_fields(fields.into_vec().as_slice())),
        filter: params.filter.as_deref().and_then(parse_where),
        sort: params
            .sort
            .clone()
            .map(|sort| parse_sort(sort.into_vec().as_slice()))
            .unwrap_or_default(),
    }
}
