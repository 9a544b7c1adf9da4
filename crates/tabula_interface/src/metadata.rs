//! Metadata lookup.

use async_trait::async_trait;
use tabula_core::{Column, Table, View};
use tabula_error::TabulaResult;

/// Source of table and view definitions.
///
/// Metadata is read-only from the API's point of view.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetches a table with its columns.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no table has this id.
    async fn get_table(&self, table_id: &str) -> TabulaResult<Table>;

    /// Fetches the columns of a table, in table-defined order.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no table has this id.
    async fn get_columns(&self, table_id: &str) -> TabulaResult<Vec<Column>> {
        Ok(self.get_table(table_id).await?.columns().clone())
    }

    /// Fetches a saved view.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no view has this id.
    async fn get_view(&self, view_id: &str) -> TabulaResult<View>;
}
