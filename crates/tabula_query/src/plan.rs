//! Query plans: resolved, typed, dialect-neutral descriptions of the work a
//! backend must do.
//!
//! [`PlanBuilder`] is the only place field references meet table metadata.
//! Backends either render plans to SQL ([`crate::SqlRenderer`]) or evaluate
//! them directly.

use crate::{EffectiveQuery, FieldResolver, PageRequest, Scope, SqlValue, resolve_projection};
use derive_getters::Getters;
use std::collections::HashSet;
use tabula_core::{
    Column, ColumnType, Comparison, ComparisonOp, FilterNode, LogicalOp, Row, SortDirection,
    SortEntry, Table,
};
use tabula_error::{
    ApiError, ApiErrorKind, QueryError, QueryErrorKind, QueryResult, TabulaResult,
};
use tracing::{debug, warn};

/// A physical column as it appears in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters)]
pub struct ColumnRef {
    /// Physical column name
    name: String,
    /// Output key (the column title)
    alias: String,
    /// Semantic type
    column_type: ColumnType,
}

impl ColumnRef {
    /// Reference to a metadata column.
    pub fn of(column: &Column) -> Self {
        Self {
            name: column.column_name().clone(),
            alias: column.title().clone(),
            column_type: *column.column_type(),
        }
    }
}

/// Scalar comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CompareOp {
    /// Equal
    #[strum(to_string = "=")]
    Eq,
    /// Not equal, NULL included
    #[strum(to_string = "<>")]
    Neq,
    /// Greater than
    #[strum(to_string = ">")]
    Gt,
    /// Greater or equal
    #[strum(to_string = ">=")]
    Ge,
    /// Less than
    #[strum(to_string = "<")]
    Lt,
    /// Less or equal
    #[strum(to_string = "<=")]
    Le,
}

/// Where a text match is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Anywhere
    Contains,
    /// At the start
    Prefix,
    /// At the end
    Suffix,
}

/// A resolved, typed filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op value`
    Compare {
        /// Column
        column: ColumnRef,
        /// Operator
        op: CompareOp,
        /// Coerced operand
        value: SqlValue,
    },
    /// Case-insensitive text match
    Match {
        /// Column
        column: ColumnRef,
        /// Anchoring
        kind: MatchKind,
        /// Literal text, unescaped
        text: String,
        /// Match must fail (NULL included)
        negated: bool,
    },
    /// `IS NULL` / `IS NOT NULL`
    Null {
        /// Column
        column: ColumnRef,
        /// `IS NOT NULL`
        negated: bool,
    },
    /// NULL or empty string
    Blank {
        /// Column
        column: ColumnRef,
        /// Neither NULL nor empty
        negated: bool,
    },
    /// Membership in a literal list
    InList {
        /// Column
        column: ColumnRef,
        /// Coerced list
        values: Vec<SqlValue>,
        /// Not in the list (NULL included)
        negated: bool,
    },
    /// Multi-select containment
    Contains {
        /// Column
        column: ColumnRef,
        /// Options looked for
        items: Vec<String>,
        /// Every option must be present, otherwise any one
        all: bool,
        /// Containment must fail (NULL included)
        negated: bool,
    },
    /// Every child holds
    All(Vec<Predicate>),
    /// At least one child holds
    Any(Vec<Predicate>),
    /// Child does not hold
    Not(Box<Predicate>),
}

/// One ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column
    pub column: ColumnRef,
    /// Direction
    pub direction: SortDirection,
}

/// Row retrieval.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct SelectPlan {
    /// Physical table name
    table: String,
    /// Projected columns, table order
    columns: Vec<ColumnRef>,
    /// Row filter
    filter: Option<Predicate>,
    /// Ordering, ending with the primary key when there is one
    order: Vec<OrderBy>,
    /// Offset/limit window
    window: Option<PageRequest>,
}

/// Row counting, sharing the filter of a [`SelectPlan`].
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct CountPlan {
    /// Physical table name
    table: String,
    /// Row filter
    filter: Option<Predicate>,
}

/// A column assignment of an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target column
    pub column: ColumnRef,
    /// Coerced value
    pub value: SqlValue,
}

/// Insert of one or more records.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct InsertPlan {
    /// Physical table name
    table: String,
    /// Primary key, returned for every inserted row
    primary_key: ColumnRef,
    /// Whether the store generates the key
    generated_key: bool,
    /// Assignments per record, in input order
    rows: Vec<Vec<Assignment>>,
}

/// Assignments addressed to one row.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedAssignments {
    /// Primary key value
    pub key: SqlValue,
    /// Column assignments, possibly empty
    pub assignments: Vec<Assignment>,
}

/// Update of one or more rows by primary key.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct UpdatePlan {
    /// Physical table name
    table: String,
    /// Primary key
    primary_key: ColumnRef,
    /// Per-row assignments, in input order
    rows: Vec<KeyedAssignments>,
}

/// Delete of one or more rows by primary key.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct DeletePlan {
    /// Physical table name
    table: String,
    /// Primary key
    primary_key: ColumnRef,
    /// Keys, in input order
    keys: Vec<SqlValue>,
}

/// A write, executed all-or-nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationPlan {
    /// Insert
    Insert(InsertPlan),
    /// Update
    Update(UpdatePlan),
    /// Delete
    Delete(DeletePlan),
}

impl MutationPlan {
    /// Physical table the mutation targets.
    pub fn table(&self) -> &str {
        match self {
            MutationPlan::Insert(p) => &p.table,
            MutationPlan::Update(p) => &p.table,
            MutationPlan::Delete(p) => &p.table,
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        match self {
            MutationPlan::Insert(p) => p.rows.len(),
            MutationPlan::Update(p) => p.rows.len(),
            MutationPlan::Delete(p) => p.keys.len(),
        }
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Primary key column of the target table.
    pub fn primary_key(&self) -> &ColumnRef {
        match self {
            MutationPlan::Insert(p) => &p.primary_key,
            MutationPlan::Update(p) => &p.primary_key,
            MutationPlan::Delete(p) => &p.primary_key,
        }
    }
}

/// Builds plans for one table, honouring the active view's hidden fields.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    resolver: FieldResolver<'a>,
}

impl<'a> PlanBuilder<'a> {
    /// Builder over a resolver (which carries the hidden fields).
    pub fn new(resolver: FieldResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Builder with every column visible.
    pub fn for_table(table: &'a Table) -> Self {
        Self::new(FieldResolver::new(table))
    }

    fn table(&self) -> &'a Table {
        self.resolver.table()
    }

    fn primary_key(&self) -> QueryResult<&'a Column> {
        self.table().primary_key().ok_or_else(|| {
            QueryError::new(QueryErrorKind::MissingPrimaryKeyColumn(
                self.table().title().clone(),
            ))
        })
    }

    /// Lowers a filter tree to a predicate.
    ///
    /// Comparisons on unknown or virtual fields, with operators the column
    /// type does not support, or with literals that do not coerce are dropped
    /// and logged. Filters may reference hidden fields.
    pub fn predicate(&self, filter: &FilterNode) -> Option<Predicate> {
        match filter {
            FilterNode::Comparison(comparison) => {
                let column = self.resolver.resolve(&comparison.field, Scope::All)?;
                match lower_comparison(column, comparison) {
                    Ok(predicate) => Some(predicate),
                    Err(e) => {
                        warn!(error = %e.kind, clause = %comparison, "Dropping filter clause");
                        None
                    }
                }
            }
            FilterNode::Group { op, children } => {
                let mut lowered: Vec<Predicate> =
                    children.iter().filter_map(|c| self.predicate(c)).collect();
                match lowered.len() {
                    0 => None,
                    1 => lowered.pop(),
                    _ => Some(match op {
                        LogicalOp::And => Predicate::All(lowered),
                        LogicalOp::Or => Predicate::Any(lowered),
                    }),
                }
            }
            FilterNode::Not(inner) => self
                .predicate(inner)
                .map(|p| Predicate::Not(Box::new(p))),
        }
    }

    /// Resolves a sort list to ordering terms.
    ///
    /// Unknown fields are dropped, a repeated column keeps its first
    /// direction, and the primary key is appended ascending when missing so
    /// that pages are stable.
    pub fn order(&self, sort: &[SortEntry]) -> Vec<OrderBy> {
        let mut seen = HashSet::new();
        let mut order: Vec<OrderBy> = self
            .resolver
            .resolve_or_omit(sort.iter(), Scope::All, |e| e.field.as_str())
            .into_iter()
            .filter(|(entry, column)| {
                if matches!(column.column_type(), ColumnType::Json | ColumnType::Attachment) {
                    debug!(field = %entry.field, "Dropping sort on unorderable field");
                    return false;
                }
                seen.insert(column.id().as_str())
            })
            .map(|(entry, column)| OrderBy {
                column: ColumnRef::of(column),
                direction: entry.direction,
            })
            .collect();

        if let Some(pk) = self.table().primary_key()
            && !seen.contains(pk.id().as_str())
        {
            order.push(OrderBy {
                column: ColumnRef::of(pk),
                direction: SortDirection::Asc,
            });
        }
        order
    }

    fn columns(&self, fields: Option<&[String]>) -> Vec<ColumnRef> {
        resolve_projection(&self.resolver, fields)
            .into_iter()
            .map(ColumnRef::of)
            .collect()
    }

    /// Plans a list query.
    pub fn select(&self, query: &EffectiveQuery, window: Option<PageRequest>) -> SelectPlan {
        SelectPlan {
            table: self.table().table_name().clone(),
            columns: self.columns(query.fields.as_deref()),
            filter: query.filter.as_ref().and_then(|f| self.predicate(f)),
            order: self.order(&query.sort),
            window,
        }
    }

    /// Plans the count matching a list query.
    pub fn count(&self, query: &EffectiveQuery) -> CountPlan {
        CountPlan {
            table: self.table().table_name().clone(),
            filter: query.filter.as_ref().and_then(|f| self.predicate(f)),
        }
    }

    /// Plans a single-row lookup by primary key.
    ///
    /// # Errors
    ///
    /// Fails when the table has no primary key or the key does not coerce to
    /// the key column type.
    pub fn read(&self, key: &str, fields: Option<&[String]>) -> QueryResult<SelectPlan> {
        let pk = self.primary_key()?;
        let value = SqlValue::from_literal(pk, key)?;
        Ok(SelectPlan {
            table: self.table().table_name().clone(),
            columns: self.columns(fields),
            filter: Some(Predicate::Compare {
                column: ColumnRef::of(pk),
                op: CompareOp::Eq,
                value,
            }),
            order: Vec::new(),
            window: Some(PageRequest::single()),
        })
    }

    /// Plans an insert.
    ///
    /// Keys that do not resolve to a visible, writable column are dropped.
    pub fn insert(&self, records: &[Row]) -> TabulaResult<InsertPlan> {
        let pk = self.primary_key()?;
        let rows = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.assignments(index, record, None))
            .collect::<TabulaResult<Vec<_>>>()?;
        Ok(InsertPlan {
            table: self.table().table_name().clone(),
            primary_key: ColumnRef::of(pk),
            generated_key: *pk.auto_increment() || *pk.column_type() == ColumnType::Id,
            rows,
        })
    }

    /// Plans an update.
    ///
    /// # Errors
    ///
    /// Any record without its primary key fails the whole batch with
    /// [`ApiErrorKind::MissingPrimaryKey`].
    pub fn update(&self, records: &[Row]) -> TabulaResult<UpdatePlan> {
        let pk = self.primary_key()?;
        let rows = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                Ok(KeyedAssignments {
                    key: self.key_of(index, record, pk)?,
                    assignments: self.assignments(index, record, Some(pk))?,
                })
            })
            .collect::<TabulaResult<Vec<_>>>()?;
        Ok(UpdatePlan {
            table: self.table().table_name().clone(),
            primary_key: ColumnRef::of(pk),
            rows,
        })
    }

    /// Plans a delete.
    ///
    /// # Errors
    ///
    /// Any record without its primary key fails the whole batch with
    /// [`ApiErrorKind::MissingPrimaryKey`].
    pub fn delete(&self, records: &[Row]) -> TabulaResult<DeletePlan> {
        let pk = self.primary_key()?;
        let keys = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.key_of(index, record, pk))
            .collect::<TabulaResult<Vec<_>>>()?;
        Ok(DeletePlan {
            table: self.table().table_name().clone(),
            primary_key: ColumnRef::of(pk),
            keys,
        })
    }

    /// Extracts and coerces the primary key of a mutation record.
    ///
    /// Record keys go through the same resolution as every other field
    /// reference, so any spelling that names the key column is accepted.
    fn key_of(&self, index: usize, record: &Row, pk: &Column) -> TabulaResult<SqlValue> {
        let raw = record
            .iter()
            .filter(|(_, value)| !value.is_null())
            .find(|(field, _)| {
                self.resolver
                    .resolve(field, Scope::All)
                    .is_some_and(|c| c.id() == pk.id())
            })
            .map(|(_, value)| value)
            .ok_or_else(|| {
                ApiError::new(ApiErrorKind::MissingPrimaryKey {
                    index,
                    column: pk.title().clone(),
                })
            })?;
        let key = SqlValue::from_json(pk, raw).map_err(|e| {
            ApiError::new(ApiErrorKind::InvalidPayload(format!(
                "record {}: {}",
                index, e.kind
            )))
        })?;
        Ok(key)
    }

    fn assignments(
        &self,
        index: usize,
        record: &Row,
        skip: Option<&Column>,
    ) -> TabulaResult<Vec<Assignment>> {
        let mut seen = HashSet::new();
        let mut assignments = Vec::new();
        for (key, value) in record {
            let Some(column) = self.resolver.resolve(key, Scope::Visible) else {
                continue;
            };
            if !column.is_writable()
                || skip.is_some_and(|s| s.id() == column.id())
                || !seen.insert(column.id().as_str())
            {
                continue;
            }
            let value = SqlValue::from_json(column, value).map_err(|e| {
                ApiError::new(ApiErrorKind::InvalidPayload(format!(
                    "record {}: {}",
                    index, e.kind
                )))
            })?;
            assignments.push(Assignment {
                column: ColumnRef::of(column),
                value,
            });
        }
        Ok(assignments)
    }
}

/// Type-checks one comparison against its column and lowers it.
fn lower_comparison(column: &Column, comparison: &Comparison) -> QueryResult<Predicate> {
    let column_type = *column.column_type();
    let col = ColumnRef::of(column);
    let op = comparison.op;
    let unsupported = || {
        QueryError::new(QueryErrorKind::UnsupportedOperator {
            operator: op.to_string(),
            column: column.title().clone(),
        })
    };
    let literal = comparison.value.as_single().unwrap_or_default();
    let is_select = matches!(column_type, ColumnType::SingleSelect | ColumnType::MultiSelect);
    let is_document = matches!(column_type, ColumnType::Json | ColumnType::Attachment);

    match op {
        ComparisonOp::Eq | ComparisonOp::Neq => {
            if is_document {
                return Err(unsupported());
            }
            Ok(Predicate::Compare {
                column: col,
                op: if op == ComparisonOp::Eq {
                    CompareOp::Eq
                } else {
                    CompareOp::Neq
                },
                value: SqlValue::from_literal(column, literal)?,
            })
        }
        ComparisonOp::Gt | ComparisonOp::Ge | ComparisonOp::Lt | ComparisonOp::Le => {
            if !column_type.is_orderable() {
                return Err(unsupported());
            }
            let op = match op {
                ComparisonOp::Gt => CompareOp::Gt,
                ComparisonOp::Ge => CompareOp::Ge,
                ComparisonOp::Lt => CompareOp::Lt,
                _ => CompareOp::Le,
            };
            Ok(Predicate::Compare {
                column: col,
                op,
                value: SqlValue::from_literal(column, literal)?,
            })
        }
        ComparisonOp::Like | ComparisonOp::Nlike | ComparisonOp::Sw | ComparisonOp::Ew => {
            if !column_type.is_textual() && !is_select {
                return Err(unsupported());
            }
            let kind = match op {
                ComparisonOp::Sw => MatchKind::Prefix,
                ComparisonOp::Ew => MatchKind::Suffix,
                _ => MatchKind::Contains,
            };
            Ok(Predicate::Match {
                column: col,
                kind,
                text: literal.to_string(),
                negated: op == ComparisonOp::Nlike,
            })
        }
        ComparisonOp::Is | ComparisonOp::Isnot => {
            let negated = op == ComparisonOp::Isnot;
            match literal.trim().to_ascii_lowercase().as_str() {
                "null" => Ok(Predicate::Null {
                    column: col,
                    negated,
                }),
                "blank" | "empty" => Ok(blank(col, negated)),
                _ => Err(QueryError::new(QueryErrorKind::InvalidLiteral {
                    column: column.title().clone(),
                    value: literal.to_string(),
                })),
            }
        }
        ComparisonOp::Blank | ComparisonOp::Notblank => {
            Ok(blank(col, op == ComparisonOp::Notblank))
        }
        ComparisonOp::Checked | ComparisonOp::Notchecked => {
            if column_type != ColumnType::Checkbox {
                return Err(unsupported());
            }
            Ok(Predicate::Compare {
                column: col,
                op: if op == ComparisonOp::Checked {
                    CompareOp::Eq
                } else {
                    CompareOp::Neq
                },
                value: SqlValue::Bool(true),
            })
        }
        ComparisonOp::In => {
            if is_document || column_type == ColumnType::MultiSelect {
                return Err(unsupported());
            }
            let values = comparison
                .value
                .items()
                .into_iter()
                .map(|item| SqlValue::from_literal(column, item))
                .collect::<QueryResult<Vec<_>>>()?;
            Ok(Predicate::InList {
                column: col,
                values,
                negated: false,
            })
        }
        ComparisonOp::Anyof | ComparisonOp::Nanyof | ComparisonOp::Allof | ComparisonOp::Nallof => {
            let negated = matches!(op, ComparisonOp::Nanyof | ComparisonOp::Nallof);
            let all = matches!(op, ComparisonOp::Allof | ComparisonOp::Nallof);
            let items: Vec<String> = comparison
                .value
                .items()
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
            match column_type {
                ColumnType::MultiSelect => Ok(Predicate::Contains {
                    column: col,
                    items,
                    all,
                    negated,
                }),
                ColumnType::SingleSelect if !all => Ok(Predicate::InList {
                    column: col,
                    values: items.into_iter().map(SqlValue::Text).collect(),
                    negated,
                }),
                _ => Err(unsupported()),
            }
        }
    }
}

fn blank(column: ColumnRef, negated: bool) -> Predicate {
    let column_type = *column.column_type();
    if column_type.is_textual()
        || matches!(column_type, ColumnType::SingleSelect | ColumnType::MultiSelect)
    {
        Predicate::Blank { column, negated }
    } else {
        Predicate::Null { column, negated }
    }
}
