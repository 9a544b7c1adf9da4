//! Loading configuration and catalogs from disk.

use std::io::Write;
use tabula::{CatalogMetadataStore, TabulaConfig};
use tabula_interface::MetadataStore;
use tabula_query::Dialect;
use tempfile::NamedTempFile;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_from_file() {
    let file = write_temp(
        r#"
catalog = "catalog.toml"

[pagination]
default_limit = 50
max_limit = 200

[database]
url = "postgres://localhost/world"
pool_size = 4
dialect = "mysql"
"#,
    );

    let config = TabulaConfig::from_file(file.path()).unwrap();

    assert_eq!(*config.pagination().default_limit(), 50);
    assert_eq!(*config.pagination().max_limit(), 200);
    assert_eq!(*config.pagination().default_offset(), 0);
    assert_eq!(config.database().url().as_deref(), Some("postgres://localhost/world"));
    assert_eq!(*config.database().pool_size(), 4);
    assert_eq!(*config.database().dialect(), Dialect::Mysql);
}

#[test]
fn test_config_rejects_default_above_max() {
    let file = write_temp("[pagination]\ndefault_limit = 500\nmax_limit = 100\n");

    let err = TabulaConfig::from_file(file.path()).unwrap_err();

    assert!(err.to_string().contains("max_limit"));
}

#[test]
fn test_config_reports_parse_errors() {
    let file = write_temp("[pagination\n");

    let err = TabulaConfig::from_file(file.path()).unwrap_err();

    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = TabulaConfig::from_file(dir.path().join("absent.toml")).unwrap_err();

    assert!(err.to_string().contains("Failed to read config file"));
}

#[tokio::test]
async fn test_catalog_from_file() {
    let file = write_temp(
        r#"
[[tables]]
id = "tbl_city"
base = "world"
title = "City"
table_name = "city"

[[tables.columns]]
id = "col_id"
title = "Id"
column_name = "id"
type = "id"
primary_key = true
auto_increment = true

[[tables.columns]]
id = "col_tags"
title = "Tags"
column_name = "tags"
type = "multi_select"
options = [{ title = "capital", order = 1 }, { title = "port", order = 2 }]

[[views]]
id = "vw_ports"
table = "tbl_city"
where = "(Tags,anyof,port)"
"#,
    );

    let catalog = CatalogMetadataStore::from_file(file.path()).unwrap();

    let columns = catalog.get_columns("tbl_city").await.unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[1].options().len(), 2);
    assert!(catalog.get_view("vw_ports").await.unwrap().filter().is_some());
    assert_eq!(catalog.table_ids().collect::<Vec<_>>(), vec!["tbl_city"]);
}
