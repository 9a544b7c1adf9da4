//! PostgreSQL connection pool.

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use tabula_error::{DatabaseError, DatabaseErrorKind, DatabaseResult};
use tracing::instrument;

/// Pool of PostgreSQL connections.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Create a connection pool for the given database URL.
///
/// # Errors
///
/// Returns an error if pool creation fails.
#[instrument(name = "database.create_pool", skip(database_url))]
pub fn create_pool(database_url: &str, max_size: u32) -> DatabaseResult<PgPool> {
    tracing::debug!(max_size, "Creating PostgreSQL connection pool");
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder().max_size(max_size).build(manager).map_err(|e| {
        tracing::error!(error = %e, "Failed to create connection pool");
        DatabaseError::new(DatabaseErrorKind::Connection(e.to_string()))
    })
}
