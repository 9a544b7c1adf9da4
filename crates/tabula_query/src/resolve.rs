//! Field reference resolution against table metadata.
//!
//! Every field reference in a request (projection, filter, sort, payload key)
//! goes through [`FieldResolver`]. References that do not resolve to a
//! physical column are omitted, never fatal.

use std::collections::HashSet;
use tabula_core::{Column, Table};
use tracing::debug;

/// Which columns a lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Any physical column, hidden or not
    All,
    /// Physical columns not hidden by the active view
    Visible,
}

/// Resolves field references to the columns of one table.
///
/// A reference matches a column by exact title, then id, then physical
/// column name, then case-insensitive title.
#[derive(Debug, Clone)]
pub struct FieldResolver<'a> {
    table: &'a Table,
    hidden: HashSet<&'a str>,
}

impl<'a> FieldResolver<'a> {
    /// Resolver with every column visible.
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            hidden: HashSet::new(),
        }
    }

    /// Resolver hiding the columns the given references resolve to.
    pub fn hiding<S: AsRef<str>>(table: &'a Table, hidden: &[S]) -> Self {
        let mut resolver = Self::new(table);
        let ids: HashSet<&'a str> = hidden
            .iter()
            .filter_map(|field| resolver.lookup(field.as_ref()))
            .map(|column| column.id().as_str())
            .collect();
        resolver.hidden = ids;
        resolver
    }

    /// The table being resolved against.
    pub fn table(&self) -> &'a Table {
        self.table
    }

    fn lookup(&self, field_ref: &str) -> Option<&'a Column> {
        let columns = self.table.columns();
        let field_ref = field_ref.trim();
        columns
            .iter()
            .find(|c| c.title() == field_ref)
            .or_else(|| columns.iter().find(|c| c.id() == field_ref))
            .or_else(|| columns.iter().find(|c| c.column_name() == field_ref))
            .or_else(|| {
                columns
                    .iter()
                    .find(|c| c.title().eq_ignore_ascii_case(field_ref))
            })
            .filter(|c| c.is_physical())
    }

    /// Resolves one reference, or `None` when it must be omitted.
    pub fn resolve(&self, field_ref: &str, scope: Scope) -> Option<&'a Column> {
        let column = self.lookup(field_ref);
        match (column, scope) {
            (None, _) => {
                debug!(field = field_ref, table = %self.table.title(), "Omitting unknown field");
                None
            }
            (Some(c), Scope::Visible) if self.is_hidden(c) => {
                debug!(field = field_ref, "Omitting hidden field");
                None
            }
            (Some(c), _) => Some(c),
        }
    }

    /// Resolves each item's field reference, dropping items that do not
    /// resolve. Item order is preserved.
    pub fn resolve_or_omit<T, I, F>(&self, items: I, scope: Scope, field_of: F) -> Vec<(T, &'a Column)>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> &str,
    {
        items
            .into_iter()
            .filter_map(|item| {
                let column = self.resolve(field_of(&item), scope)?;
                Some((item, column))
            })
            .collect()
    }

    /// Whether the reference names a column hidden by the active view.
    pub fn refers_to_hidden(&self, field_ref: &str) -> bool {
        self.lookup(field_ref).is_some_and(|c| self.is_hidden(c))
    }

    /// Whether the column is hidden by the active view.
    pub fn is_hidden(&self, column: &Column) -> bool {
        self.hidden.contains(column.id().as_str())
    }

    /// Visible physical columns in table-defined order.
    pub fn visible_columns(&self) -> impl Iterator<Item = &'a Column> + '_ {
        self.table
            .columns()
            .iter()
            .filter(move |c| c.is_physical() && !self.is_hidden(c))
    }
}
