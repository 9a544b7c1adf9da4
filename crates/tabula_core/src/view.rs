//! Saved view metadata.

use crate::{FilterNode, SortEntry};
use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A persisted filter, sort and field-visibility overlay bound to a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct View {
    /// Stable identifier
    id: String,
    /// Table the view belongs to
    #[builder(default, setter(into, strip_option))]
    table_id: Option<String>,
    /// Display title
    #[builder(default)]
    title: String,
    /// Persisted filter
    #[serde(default)]
    #[builder(default, setter(into, strip_option))]
    filter: Option<FilterNode>,
    /// Persisted base ordering
    #[serde(default)]
    #[builder(default)]
    sort: Vec<SortEntry>,
    /// Field references never returned through this view
    #[serde(default)]
    #[builder(default)]
    hidden: Vec<String>,
}

impl View {
    /// Starts building a view.
    pub fn builder() -> ViewBuilder {
        ViewBuilder::default()
    }

    /// Whether the view may be used to query the given table.
    ///
    /// A view without a table reference applies to any table.
    pub fn belongs_to(&self, table_id: &str) -> bool {
        self.table_id.as_deref().is_none_or(|id| id == table_id)
    }
}
