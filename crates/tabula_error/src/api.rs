//! Request-level validation error types.

/// Conditions that terminate a table API request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ApiErrorKind {
    /// Table, view or row does not exist
    #[display("{entity} '{id}' not found")]
    NotFound {
        /// Kind of entity ("table", "view", "row")
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },
    /// View is bound to a different table
    #[display("View '{view}' does not belong to table '{table}'")]
    ViewTableMismatch {
        /// View identifier
        view: String,
        /// Table identifier
        table: String,
    },
    /// Mutation record lacks its primary key value
    #[display("Record at index {index} is missing primary key '{column}'")]
    MissingPrimaryKey {
        /// Position of the record in the batch
        index: usize,
        /// Primary key column title
        column: String,
    },
    /// Payload shape or value is unusable
    #[display("Invalid payload: {}", _0)]
    InvalidPayload(String),
}

/// API error with source location tracking.
///
/// # Examples
///
/// ```
/// use tabula_error::{ApiError, ApiErrorKind};
///
/// let err = ApiError::new(ApiErrorKind::NotFound { entity: "table", id: "t1".into() });
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("API Error: {} at line {} in {}", kind, line, file)]
pub struct ApiError {
    /// The kind of error that occurred
    pub kind: ApiErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ApiError {
    /// Create a new ApiError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ApiErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a not-found error.
    #[track_caller]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound {
            entity,
            id: id.into(),
        })
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }
}

/// Result type for API validation.
pub type ApiResult<T> = Result<T, ApiError>;
