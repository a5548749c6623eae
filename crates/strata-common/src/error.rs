//! Error types for StrataDB

use thiserror::Error;

/// Result type alias using StrataDB's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for StrataDB
#[derive(Error, Debug)]
pub enum Error {
    // Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // SQL errors (schema resolution and translation)
    #[error("SQL error: {0}")]
    Sql(#[from] SqlError),

    // Query errors (evaluation and resources)
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    // Invariant violations; unrecoverable
    #[error("Internal error: {0}")]
    Internal(String),

    // Not found
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    // Already exists
    #[error("{0} already exists: {1}")]
    AlreadyExists(String, String),

    // Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Chunk not found: {0}")]
    ChunkNotFound(u32),

    #[error("Column {column} is immutable and cannot be appended to")]
    ImmutableColumn { column: String },

    #[error("Row width {actual} does not match table width {expected}")]
    RowWidthMismatch { expected: usize, actual: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

#[derive(Error, Debug)]
pub enum SqlError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Ambiguous column: {0}")]
    AmbiguousColumn(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Query cancelled")]
    Cancelled,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Overflow")]
    Overflow,
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound(kind.into(), name.into())
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::AlreadyExists(kind.into(), name.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Sql(SqlError::UnsupportedFeature(msg.into()))
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Query(QueryError::ExecutionError(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("Table", "users");
        assert_eq!(err.to_string(), "Table not found: users");

        let err = Error::Query(QueryError::DivisionByZero);
        assert_eq!(err.to_string(), "Query error: Division by zero");

        let err = Error::Sql(SqlError::AmbiguousColumn("b".into()));
        assert_eq!(err.to_string(), "SQL error: Ambiguous column: b");
    }

    #[test]
    fn test_error_from_sub_errors() {
        let err: Error = SqlError::TableNotFound("t".into()).into();
        assert!(matches!(err, Error::Sql(_)));

        let err: Error = StorageError::ChunkNotFound(3).into();
        assert!(matches!(err, Error::Storage(_)));

        let err: Error = QueryError::Cancelled.into();
        assert!(matches!(err, Error::Query(_)));
    }
}
