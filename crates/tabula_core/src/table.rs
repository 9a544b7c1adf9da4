//! Table metadata.

use crate::Column;
use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A user-defined table mapped onto a backing relational table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct Table {
    /// Stable identifier
    id: String,
    /// Owning base, used to resolve the connection
    base_id: String,
    /// Display title
    title: String,
    /// Physical table name
    table_name: String,
    /// Columns in table-defined order
    #[serde(default)]
    #[builder(default)]
    columns: Vec<Column>,
}

impl Table {
    /// Starts building a table.
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// The primary key column, if the table has one.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| *c.primary_key())
    }

    /// Returns the first duplicated column title, if any.
    pub fn duplicate_title(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.columns
            .iter()
            .map(|c| c.title().as_str())
            .find(|title| !seen.insert(*title))
    }
}
