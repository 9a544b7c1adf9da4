//! Shared fixtures for the table service tests.
//!
//! The country table has 400 rows; the first 31 are all named
//! "Afghanistan", the rest "Country {id}". Continents cycle through Africa,
//! Asia and Europe, and populations repeat every 10 rows so sorts have ties.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use tabula::{CatalogMetadataStore, TableService};
use tabula_core::{Column, ColumnType, Row, SelectOption, Table, View};
use tabula_database::{MemoryConnection, StaticConnectionResolver};
use tabula_query::{PaginationConfig, parse_filter, parse_sort};

pub const COUNTRY: &str = "tbl_country";
pub const CITY: &str = "tbl_city";
pub const ASIA_VIEW: &str = "vw_asia";
pub const CITY_VIEW: &str = "vw_city";
pub const ROWS: i64 = 400;
pub const AFGHANISTAN_ROWS: i64 = 31;

const CONTINENTS: [&str; 3] = ["Africa", "Asia", "Europe"];

fn column(title: &str, column_type: ColumnType) -> Column {
    Column::builder()
        .id(format!("col_{}", title.to_lowercase()))
        .title(title)
        .column_name(title.to_lowercase())
        .column_type(column_type)
        .build()
        .unwrap()
}

fn id_column() -> Column {
    Column::builder()
        .id("col_id")
        .title("Id")
        .column_name("id")
        .column_type(ColumnType::Id)
        .primary_key(true)
        .auto_increment(true)
        .build()
        .unwrap()
}

pub fn country_table() -> Table {
    let continent = Column::builder()
        .id("col_continent")
        .title("Continent")
        .column_name("continent")
        .column_type(ColumnType::SingleSelect)
        .options(
            CONTINENTS
                .iter()
                .enumerate()
                .map(|(i, c)| SelectOption::new(*c, i as u32))
                .collect::<Vec<_>>(),
        )
        .build()
        .unwrap();
    Table::builder()
        .id(COUNTRY)
        .base_id("world")
        .title("Country")
        .table_name("country")
        .columns(vec![
            id_column(),
            column("Name", ColumnType::Text),
            continent,
            column("Population", ColumnType::Number),
            column("Notes", ColumnType::LongText),
        ])
        .build()
        .unwrap()
}

pub fn city_table() -> Table {
    Table::builder()
        .id(CITY)
        .base_id("world")
        .title("City")
        .table_name("city")
        .columns(vec![id_column(), column("Name", ColumnType::Text)])
        .build()
        .unwrap()
}

/// Asia only, most populous first, notes hidden.
pub fn asia_view() -> View {
    View::builder()
        .id(ASIA_VIEW)
        .table_id(COUNTRY)
        .title("Asia")
        .filter(parse_filter("(Continent,eq,Asia)").unwrap().unwrap())
        .sort(parse_sort(&["-Population"][..]))
        .hidden(vec!["Notes".to_string()])
        .build()
        .unwrap()
}

pub fn city_view() -> View {
    View::builder()
        .id(CITY_VIEW)
        .table_id(CITY)
        .title("All cities")
        .build()
        .unwrap()
}

pub fn continent_of(id: i64) -> &'static str {
    CONTINENTS[(id % 3) as usize]
}

pub fn population_of(id: i64) -> i64 {
    (id % 10) * 1000
}

pub fn country_row(id: i64) -> Row {
    let name = if id <= AFGHANISTAN_ROWS {
        "Afghanistan".to_string()
    } else {
        format!("Country {}", id)
    };
    json!({
        "id": id,
        "name": name,
        "continent": continent_of(id),
        "population": population_of(id),
        "notes": format!("secret {}", id),
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn payload(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

/// Service over a seeded in-memory store, plus the store for inspection.
pub async fn service() -> (TableService, MemoryConnection) {
    let connection = MemoryConnection::new();
    connection
        .seed("country", (1..=ROWS).map(country_row))
        .await;
    connection.create_table("city").await;

    let catalog = CatalogMetadataStore::new()
        .with_table(country_table())
        .unwrap()
        .with_table(city_table())
        .unwrap()
        .with_view(asia_view())
        .unwrap()
        .with_view(city_view())
        .unwrap();
    let resolver = StaticConnectionResolver::new().with_base("world", Arc::new(connection.clone()));
    let service = TableService::new(
        Arc::new(catalog),
        Arc::new(resolver),
        PaginationConfig::default(),
    );
    (service, connection)
}

pub fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r["Id"].as_i64().unwrap()).collect()
}
