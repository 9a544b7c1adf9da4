//! Tabula: a CRUD and query API over user-defined tables.
//!
//! [`TableService`] is the entry point. It resolves tables and saved views
//! through a [`tabula_interface::MetadataStore`], overlays the view's filter,
//! sort and hidden fields onto the request, and runs the resulting plans on
//! the connection that serves the table's base.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula::{CatalogMetadataStore, ListParams, TableService, TabulaConfig};
//! use tabula_database::{MemoryConnection, StaticConnectionResolver};
//!
//! # async fn run() -> tabula_error::TabulaResult<()> {
//! let config = TabulaConfig::from_file("tabula.toml")?;
//! let catalog = CatalogMetadataStore::from_file("catalog.toml")?;
//! let connections = StaticConnectionResolver::single(Arc::new(MemoryConnection::new()));
//! let service = TableService::new(Arc::new(catalog), Arc::new(connections), *config.pagination());
//!
//! let page = service
//!     .list("tbl_country", &ListParams::default().with_filter("(Name,eq,Afghanistan)"))
//!     .await?;
//! println!("{} rows", page.page_info().total_rows);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod catalog;
mod config;
mod request;
mod response;
mod service;

pub use catalog::CatalogMetadataStore;
pub use config::{DatabaseConfig, TabulaConfig};
pub use request::{ListParams, OneOrMany};
pub use response::{CountResponse, ListResponse};
pub use service::TableService;
