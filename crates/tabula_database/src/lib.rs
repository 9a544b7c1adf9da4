//! Backing store connections for the Tabula table API.
//!
//! [`MemoryConnection`] evaluates query plans against rows held in memory and
//! is always available. The PostgreSQL backend renders plans to SQL and runs
//! them over a diesel r2d2 pool; it is compiled with the `postgres` feature.

mod memory;
mod resolver;

#[cfg(feature = "postgres")]
mod connection;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryConnection;
pub use resolver::StaticConnectionResolver;

#[cfg(feature = "postgres")]
pub use connection::{PgPool, create_pool};
#[cfg(feature = "postgres")]
pub use postgres::PgTableConnection;
