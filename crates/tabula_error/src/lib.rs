//! Error types for the Tabula table API.
//!
//! Every layer owns a `*ErrorKind` enum describing the condition and a
//! location-tracked error struct wrapping it. [`TabulaError`] unifies them so
//! `?` works across crate boundaries.

mod api;
mod config;
mod database;
mod error;
mod query;

pub use api::{ApiError, ApiErrorKind, ApiResult};
pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind, DatabaseResult};
pub use error::{TabulaError, TabulaErrorKind, TabulaResult};
pub use query::{QueryError, QueryErrorKind, QueryResult};
