//! Service configuration loaded from TOML.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabula_error::{ConfigError, TabulaError, TabulaResult};
use tabula_query::{Dialect, PaginationConfig};

/// Top-level configuration.
///
/// ```toml
/// catalog = "catalog.toml"
///
/// [pagination]
/// default_limit = 25
/// max_limit = 1000
///
/// [database]
/// url = "postgres://localhost/tabula"
/// pool_size = 10
/// dialect = "postgres"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct TabulaConfig {
    /// List window limits
    pagination: PaginationConfig,
    /// Backing store settings
    database: DatabaseConfig,
    /// Path of the table and view catalog
    catalog: Option<PathBuf>,
}

/// Backing store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; `DATABASE_URL` takes precedence
    url: Option<String>,
    /// Maximum pooled connections
    pool_size: u32,
    /// SQL dialect of the store
    dialect: Dialect,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
            dialect: Dialect::default(),
        }
    }
}

fn config_error(message: String) -> TabulaError {
    ConfigError::new(message).into()
}

impl TabulaConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, does not parse, or holds unusable
    /// values.
    #[tracing::instrument(skip(path))]
    pub fn from_file(path: impl AsRef<Path>) -> TabulaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Fails when the text does not parse or holds unusable values.
    pub fn from_toml_str(content: &str) -> TabulaResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| config_error(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the environment.
    ///
    /// Reads the file named by `TABULA_CONFIG` when set (defaults otherwise),
    /// then applies `DATABASE_URL` and `TABULA_CATALOG` on top.
    ///
    /// # Errors
    ///
    /// Fails when the named file cannot be loaded.
    pub fn from_env() -> TabulaResult<Self> {
        let base = match std::env::var("TABULA_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `DATABASE_URL` and `TABULA_CATALOG` from a variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            tracing::debug!("Database URL taken from environment");
            self.database.url = Some(url);
        }
        if let Some(catalog) = lookup("TABULA_CATALOG").filter(|c| !c.is_empty()) {
            self.catalog = Some(PathBuf::from(catalog));
        }
        self
    }

    /// Replaces the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database.url = Some(url.into());
        self
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first bad value.
    pub fn validate(&self) -> TabulaResult<()> {
        self.pagination.validate()?;
        if self.database.pool_size == 0 {
            return Err(config_error("database.pool_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = TabulaConfig::from_toml_str("").unwrap();
        assert_eq!(*config.pagination().default_limit(), 25);
        assert_eq!(*config.pagination().max_limit(), 1000);
        assert_eq!(*config.database().pool_size(), 10);
        assert_eq!(*config.database().dialect(), Dialect::Postgres);
        assert!(config.catalog().is_none());
    }

    #[test]
    fn overrides_replace_url_and_catalog() {
        let config = TabulaConfig::from_toml_str("[database]\nurl = \"postgres://file\"\n")
            .unwrap()
            .with_overrides(|key| match key {
                "DATABASE_URL" => Some("postgres://env".to_string()),
                "TABULA_CATALOG" => Some("tables.toml".to_string()),
                _ => None,
            });
        assert_eq!(config.database().url().as_deref(), Some("postgres://env"));
        assert_eq!(config.catalog().as_deref(), Some(Path::new("tables.toml")));
    }

    #[test]
    fn empty_override_is_ignored() {
        let config = TabulaConfig::from_toml_str("[database]\nurl = \"postgres://file\"\n")
            .unwrap()
            .with_overrides(|_| Some(String::new()));
        assert_eq!(config.database().url().as_deref(), Some("postgres://file"));
    }

    #[test]
    fn zero_pool_is_rejected() {
        let err = TabulaConfig::from_toml_str("[database]\npool_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }
}
