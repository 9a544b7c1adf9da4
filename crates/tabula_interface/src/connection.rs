//! Backing store access.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tabula_core::Row;
use tabula_error::TabulaResult;
use tabula_query::{CountPlan, MutationPlan, SelectPlan};

/// A connection to the store holding one base's tables.
#[async_trait]
pub trait TableConnection: Send + Sync {
    /// Runs a select, returning rows keyed by column title.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    async fn select(&self, plan: &SelectPlan) -> TabulaResult<Vec<Row>>;

    /// Counts the rows matching the plan's filter.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    async fn count(&self, plan: &CountPlan) -> TabulaResult<u64>;

    /// Applies a mutation all-or-nothing.
    ///
    /// Returns the primary key of every record, in input order.
    ///
    /// # Errors
    ///
    /// Returns a database error if any statement fails; nothing is applied.
    async fn mutate(&self, plan: &MutationPlan) -> TabulaResult<Vec<Value>>;
}

/// Finds the connection serving a base.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    /// Connection for the given base.
    ///
    /// # Errors
    ///
    /// Returns an error when the base is unknown or the store is unreachable.
    async fn connection(&self, base_id: &str) -> TabulaResult<Arc<dyn TableConnection>>;
}
