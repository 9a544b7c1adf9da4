//! Table and view catalog read from a TOML document.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tabula_core::{Column, Table, View};
use tabula_error::{ApiError, ConfigError, TabulaError, TabulaResult};
use tabula_interface::MetadataStore;
use tabula_query::{parse_filter, parse_sort};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tables: Vec<TableEntry>,
    #[serde(default)]
    views: Vec<ViewEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    id: String,
    base: String,
    title: String,
    table_name: String,
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Debug, Deserialize)]
struct ViewEntry {
    id: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "where")]
    filter: Option<String>,
    #[serde(default)]
    sort: Vec<String>,
    #[serde(default)]
    hidden: Vec<String>,
}

fn config_error(message: String) -> TabulaError {
    ConfigError::new(message).into()
}

/// Metadata store holding a fixed set of tables and views.
///
/// Persisted view filters are parsed once at load. Unlike request filters, a
/// malformed persisted filter is an error.
///
/// ```toml
/// [[tables]]
/// id = "tbl_country"
/// base = "world"
/// title = "Country"
/// table_name = "country"
///
/// [[tables.columns]]
/// id = "col_id"
/// title = "Id"
/// column_name = "id"
/// type = "id"
/// primary_key = true
/// auto_increment = true
///
/// [[views]]
/// id = "vw_asia"
/// table = "tbl_country"
/// where = "(Continent,eq,Asia)"
/// sort = ["-Population"]
/// hidden = ["Notes"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct CatalogMetadataStore {
    tables: HashMap<String, Table>,
    views: HashMap<String, View>,
}

impl CatalogMetadataStore {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or its content is invalid.
    #[instrument(skip(path))]
    pub fn from_file(path: impl AsRef<Path>) -> TabulaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| config_error(format!("Failed to read catalog file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on TOML errors, duplicate ids, duplicate column titles within a
    /// table, views referencing unknown tables, and malformed view filters.
    pub fn from_toml_str(content: &str) -> TabulaResult<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| config_error(format!("Failed to parse catalog: {}", e)))?;

        let mut catalog = Self::new();
        for entry in file.tables {
            let table = Table::builder()
                .id(entry.id)
                .base_id(entry.base)
                .title(entry.title)
                .table_name(entry.table_name)
                .columns(entry.columns)
                .build()
                .map_err(|e| config_error(format!("Invalid table: {}", e)))?;
            catalog = catalog.with_table(table)?;
        }
        for entry in file.views {
            catalog = catalog.with_view(view_from_entry(entry)?)?;
        }
        debug!(
            tables = catalog.tables.len(),
            views = catalog.views.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Adds a table.
    ///
    /// # Errors
    ///
    /// Fails when the id is taken or two columns share a title.
    pub fn with_table(mut self, table: Table) -> TabulaResult<Self> {
        if let Some(title) = table.duplicate_title() {
            return Err(config_error(format!(
                "Table '{}' has more than one column titled '{}'",
                table.id(),
                title
            )));
        }
        if self.tables.contains_key(table.id()) {
            return Err(config_error(format!("Duplicate table id '{}'", table.id())));
        }
        self.tables.insert(table.id().clone(), table);
        Ok(self)
    }

    /// Adds a view.
    ///
    /// # Errors
    ///
    /// Fails when the id is taken or the view names no table or an unknown
    /// one.
    pub fn with_view(mut self, view: View) -> TabulaResult<Self> {
        let Some(table_id) = view.table_id() else {
            return Err(config_error(format!("View '{}' names no table", view.id())));
        };
        if !self.tables.contains_key(table_id) {
            return Err(config_error(format!(
                "View '{}' references unknown table '{}'",
                view.id(),
                table_id
            )));
        }
        if self.views.contains_key(view.id()) {
            return Err(config_error(format!("Duplicate view id '{}'", view.id())));
        }
        self.views.insert(view.id().clone(), view);
        Ok(self)
    }

    /// Ids of every table, unordered.
    pub fn table_ids(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn view_from_entry(entry: ViewEntry) -> TabulaResult<View> {
    let filter = match entry.filter.as_deref() {
        Some(text) => parse_filter(text).map_err(|e| {
            config_error(format!("View '{}' has a malformed filter: {}", entry.id, e.kind))
        })?,
        None => None,
    };

    let mut builder = View::builder();
    builder
        .id(entry.id)
        .title(entry.title)
        .sort(parse_sort(entry.sort.as_slice()))
        .hidden(entry.hidden);
    if let Some(table) = entry.table {
        builder.table_id(table);
    }
    if let Some(filter) = filter {
        builder.filter(filter);
    }
    builder
        .build()
        .map_err(|e| config_error(format!("Invalid view: {}", e)))
}

#[async_trait]
impl MetadataStore for CatalogMetadataStore {
    async fn get_table(&self, table_id: &str) -> TabulaResult<Table> {
        self.tables
            .get(table_id)
            .or_else(|| self.tables.values().find(|t| t.title() == table_id))
            .cloned()
            .ok_or_else(|| ApiError::not_found("table", table_id).into())
    }

    async fn get_view(&self, view_id: &str) -> TabulaResult<View> {
        self.views
            .get(view_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("view", view_id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::{FilterNode, SortDirection};

    const CATALOG: &str = r#"
[[tables]]
id = "tbl_country"
base = "world"
title = "Country"
table_name = "country"

[[tables.columns]]
id = "col_id"
title = "Id"
column_name = "id"
type = "id"
primary_key = true

[[tables.columns]]
id = "col_name"
title = "Name"
column_name = "name"

[[views]]
id = "vw_named"
table = "tbl_country"
title = "Named"
where = "(Name,isnot,blank)"
sort = ["-Name"]
hidden = ["Id"]
"#;

    #[tokio::test]
    async fn loads_tables_and_views() {
        let catalog = CatalogMetadataStore::from_toml_str(CATALOG).unwrap();
        let table = catalog.get_table("tbl_country").await.unwrap();
        assert_eq!(table.columns().len(), 2);
        assert!(*table.columns()[0].primary_key());

        let view = catalog.get_view("vw_named").await.unwrap();
        assert_eq!(view.table_id().as_deref(), Some("tbl_country"));
        assert!(matches!(view.filter(), Some(FilterNode::Comparison(_))));
        assert_eq!(view.sort()[0].direction, SortDirection::Desc);
        assert_eq!(view.hidden(), &vec!["Id".to_string()]);
    }

    #[tokio::test]
    async fn tables_resolve_by_title_too() {
        let catalog = CatalogMetadataStore::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.get_table("Country").await.unwrap().id(), "tbl_country");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let catalog = CatalogMetadataStore::from_toml_str(CATALOG).unwrap();
        assert!(catalog.get_table("nope").await.unwrap_err().is_not_found());
        assert!(catalog.get_view("nope").await.unwrap_err().is_not_found());
    }

    #[test]
    fn malformed_view_filter_fails_loading() {
        let broken = CATALOG.replace("(Name,isnot,blank)", "(Name,isnot");
        let err = CatalogMetadataStore::from_toml_str(&broken).unwrap_err();
        assert!(err.to_string().contains("malformed filter"));
    }

    #[test]
    fn duplicate_column_titles_fail_loading() {
        let broken = CATALOG.replace("title = \"Id\"", "title = \"Name\"");
        let err = CatalogMetadataStore::from_toml_str(&broken).unwrap_err();
        assert!(err.to_string().contains("more than one column titled 'Name'"));
    }

    #[test]
    fn view_on_unknown_table_fails_loading() {
        let broken = CATALOG.replace("table = \"tbl_country\"", "table = \"tbl_city\"");
        let err = CatalogMetadataStore::from_toml_str(&broken).unwrap_err();
        assert!(err.to_string().contains("unknown table 'tbl_city'"));
    }

    #[test]
    fn view_without_table_fails_loading() {
        let broken = CATALOG.replace("table = \"tbl_country\"\n", "");
        let err = CatalogMetadataStore::from_toml_str(&broken).unwrap_err();
        assert!(err.to_string().contains("names no table"));
    }
}
