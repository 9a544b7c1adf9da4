//! Crate-spanning error type.

use crate::{ApiError, ApiErrorKind, ConfigError, DatabaseError, DatabaseErrorKind, QueryError, QueryErrorKind};

/// Crate-level error variants.
#[derive(Debug, derive_more::From, derive_more::Display)]
pub enum TabulaErrorKind {
    /// Query translation error
    Query(QueryError),
    /// Request validation error
    Api(ApiError),
    /// Backing store error
    Database(DatabaseError),
    /// Configuration error
    Config(ConfigError),
}

/// Tabula error with kind discrimination.
#[derive(Debug)]
pub struct TabulaError(Box<TabulaErrorKind>);

impl TabulaError {
    /// Create a new error from a kind.
    pub fn new(kind: TabulaErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &TabulaErrorKind {
        &self.0
    }

    /// Table, view or row identifier did not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            TabulaErrorKind::Api(ApiError {
                kind: ApiErrorKind::NotFound { .. },
                ..
            }) | TabulaErrorKind::Database(DatabaseError {
                kind: DatabaseErrorKind::NotFound | DatabaseErrorKind::TableNotFound(_),
                ..
            })
        )
    }

    /// Request is well-formed but cannot be processed.
    pub fn is_unprocessable(&self) -> bool {
        match self.kind() {
            TabulaErrorKind::Api(e) => !matches!(e.kind, ApiErrorKind::NotFound { .. }),
            TabulaErrorKind::Query(e) => !matches!(e.kind, QueryErrorKind::MissingPrimaryKeyColumn(_)),
            _ => false,
        }
    }

    /// Backing store could not be reached; callers may retry.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kind(),
            TabulaErrorKind::Database(DatabaseError {
                kind: DatabaseErrorKind::Connection(_),
                ..
            })
        )
    }

    /// HTTP-style status code for the terminal failure.
    pub fn status_code(&self) -> u16 {
        if self.is_not_found() {
            404
        } else if self.is_unprocessable() {
            422
        } else if self.is_connectivity() {
            503
        } else {
            500
        }
    }
}

impl std::fmt::Display for TabulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tabula Error: {}", self.0)
    }
}

impl std::error::Error for TabulaError {}

// Generic From implementation for any type that converts to TabulaErrorKind
impl<T> From<T> for TabulaError
where
    T: Into<TabulaErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Tabula operations.
pub type TabulaResult<T> = std::result::Result<T, TabulaError>;
