//! Overlay of saved view rules onto request parameters.
//!
//! Filters combine by AND, sorts concatenate with the view first, and the
//! view's hidden fields win over any request. The three rules are separate
//! functions so each can be tested on its own.

use crate::FieldResolver;
use tabula_core::{FilterNode, SortEntry, Table, View};
use tabula_error::{ApiError, ApiErrorKind, ApiResult};
use tracing::{debug, instrument};

/// Query parameters as parsed from a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    /// Requested projection, `None` for all fields
    pub fields: Option<Vec<String>>,
    /// Requested filter
    pub filter: Option<FilterNode>,
    /// Requested ordering
    pub sort: Vec<SortEntry>,
}

/// Parameters after the view overlay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveQuery {
    /// Projection, `None` for all visible fields
    pub fields: Option<Vec<String>>,
    /// Combined filter
    pub filter: Option<FilterNode>,
    /// Combined ordering, view entries first
    pub sort: Vec<SortEntry>,
    /// Field references the view hides
    pub hidden: Vec<String>,
}

/// ANDs the view filter with the request filter.
///
/// Either side may be absent; the view filter is never weakened.
pub fn merge_filters(view: Option<&FilterNode>, request: Option<&FilterNode>) -> Option<FilterNode> {
    match (view, request) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(view), Some(request)) => Some(view.clone().and(request.clone())),
    }
}

/// Concatenates view sort and request sort, view first.
pub fn merge_sort(view: &[SortEntry], request: &[SortEntry]) -> Vec<SortEntry> {
    view.iter().chain(request).cloned().collect()
}

/// Removes requested fields that the view hides.
///
/// The result is the intersection of the request with the visible fields;
/// `None` stays `None` (all visible fields).
pub fn merge_fields(resolver: &FieldResolver<'_>, requested: Option<&[String]>) -> Option<Vec<String>> {
    requested.map(|fields| {
        fields
            .iter()
            .filter(|f| !resolver.refers_to_hidden(f))
            .cloned()
            .collect()
    })
}

/// Applies an optional view to request parameters.
///
/// Request filter clauses and sort entries that reference hidden fields are
/// dropped before merging, so a hidden field can never be probed through a
/// request. View rules may still use hidden fields.
///
/// # Errors
///
/// Returns [`ApiErrorKind::ViewTableMismatch`] when the view belongs to
/// another table.
#[instrument(skip_all, fields(table = %table.title(), view = ?view.map(|v| v.id())))]
pub fn overlay(table: &Table, view: Option<&View>, request: RequestParts) -> ApiResult<EffectiveQuery> {
    let Some(view) = view else {
        return Ok(EffectiveQuery {
            fields: request.fields,
            filter: request.filter,
            sort: request.sort,
            hidden: Vec::new(),
        });
    };

    if !view.belongs_to(table.id()) {
        return Err(ApiError::new(ApiErrorKind::ViewTableMismatch {
            view: view.id().clone(),
            table: table.id().clone(),
        }));
    }

    let resolver = FieldResolver::hiding(table, view.hidden());

    let request_filter = request
        .filter
        .and_then(|f| f.retain(&mut |c| !resolver.refers_to_hidden(&c.field)));
    let request_sort: Vec<SortEntry> = request
        .sort
        .into_iter()
        .filter(|entry| {
            let hidden = resolver.refers_to_hidden(&entry.field);
            if hidden {
                debug!(field = %entry.field, "Dropping sort on hidden field");
            }
            !hidden
        })
        .collect();

    Ok(EffectiveQuery {
        fields: merge_fields(&resolver, request.fields.as_deref()),
        filter: merge_filters(view.filter().as_ref(), request_filter.as_ref()),
        sort: merge_sort(view.sort(), &request_sort),
        hidden: view.hidden().clone(),
    })
}
