//! Fixed base-to-connection mapping.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tabula_error::{ApiError, TabulaResult};
use tabula_interface::{ConnectionResolver, TableConnection};

/// Resolves bases from a map built up front, with an optional fallback.
#[derive(Clone, Default)]
pub struct StaticConnectionResolver {
    bases: HashMap<String, Arc<dyn TableConnection>>,
    fallback: Option<Arc<dyn TableConnection>>,
}

impl StaticConnectionResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver answering every base with the same connection.
    pub fn single(connection: Arc<dyn TableConnection>) -> Self {
        Self {
            bases: HashMap::new(),
            fallback: Some(connection),
        }
    }

    /// Registers the connection for a base.
    pub fn with_base(mut self, base_id: impl Into<String>, connection: Arc<dyn TableConnection>) -> Self {
        self.bases.insert(base_id.into(), connection);
        self
    }
}

impl std::fmt::Debug for StaticConnectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConnectionResolver")
            .field("bases", &self.bases.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[async_trait]
impl ConnectionResolver for StaticConnectionResolver {
    async fn connection(&self, base_id: &str) -> TabulaResult<Arc<dyn TableConnection>> {
        self.bases
            .get(base_id)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ApiError::not_found("base", base_id).into())
    }
}
