//! Query translation error types.

/// Conditions raised while parsing or planning a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum QueryErrorKind {
    /// The `where` expression is not valid filter syntax.
    #[display("Malformed filter syntax at position {position}: {message}")]
    MalformedFilterSyntax {
        /// Byte offset into the expression
        position: usize,
        /// What the parser expected
        message: String,
    },
    /// Requested offset lies beyond the number of matching rows.
    #[display("Offset {offset} is out of range for {total} rows")]
    OffsetOutOfRange {
        /// Requested offset
        offset: u64,
        /// Total matching rows
        total: u64,
    },
    /// Operator cannot be applied to the column type.
    #[display("Operator '{operator}' is not supported for column '{column}'")]
    UnsupportedOperator {
        /// Operator name
        operator: String,
        /// Column title
        column: String,
    },
    /// Literal cannot be coerced to the column type.
    #[display("Value '{value}' is not valid for column '{column}'")]
    InvalidLiteral {
        /// Column title
        column: String,
        /// Offending literal
        value: String,
    },
    /// Table has no primary key, so rows cannot be addressed.
    #[display("Table '{}' has no primary key", _0)]
    MissingPrimaryKeyColumn(String),
}

/// Query error with source location tracking.
///
/// # Examples
///
/// ```
/// use tabula_error::{QueryError, QueryErrorKind};
///
/// let err = QueryError::new(QueryErrorKind::OffsetOutOfRange { offset: 500, total: 400 });
/// assert!(format!("{}", err).contains("out of range"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Query Error: {} at line {} in {}", kind, line, file)]
pub struct QueryError {
    /// The kind of error that occurred
    pub kind: QueryErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl QueryError {
    /// Create a new QueryError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: QueryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &QueryErrorKind {
        &self.kind
    }
}

/// Result type for query translation.
pub type QueryResult<T> = Result<T, QueryError>;
