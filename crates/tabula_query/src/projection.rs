//! Field projection: which columns a response row carries.

use crate::{FieldResolver, Scope};
use std::collections::HashSet;
use tabula_core::Column;
use tracing::debug;

/// Splits `fields` parameters into trimmed, non-empty references.
pub fn parse_fields<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.as_ref().split(','))
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves the projected columns, in table-defined order.
///
/// No request (or an empty one) projects every visible physical column.
/// Unknown, virtual and hidden references are dropped; if nothing is left the
/// projection falls back to every visible column.
pub fn resolve_projection<'a>(
    resolver: &FieldResolver<'a>,
    requested: Option<&[String]>,
) -> Vec<&'a Column> {
    let visible = || resolver.visible_columns().collect::<Vec<_>>();
    let Some(requested) = requested.filter(|r| !r.is_empty()) else {
        return visible();
    };

    let wanted: HashSet<&str> = resolver
        .resolve_or_omit(requested.iter(), Scope::Visible, |f| f.as_str())
        .into_iter()
        .map(|(_, column)| column.id().as_str())
        .collect();

    if wanted.is_empty() {
        debug!(?requested, "No requested field resolved, projecting all visible fields");
        return visible();
    }

    resolver
        .visible_columns()
        .filter(|c| wanted.contains(c.id().as_str()))
        .collect()
}
