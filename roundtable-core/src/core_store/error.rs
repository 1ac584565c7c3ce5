//! Error types for the chat store

use thiserror::Error;

/// Errors returned by chat store operations.
///
/// Uniqueness races surface as `Conflict` so callers can resolve them
/// (idempotent replay, already-a-member) instead of failing the request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Uniqueness conflict on {0}")]
    Conflict(&'static str),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn pool(e: r2d2::Error) -> Self {
        StoreError::Pool(e.to_string())
    }

    /// True when a SQLite error is a constraint (uniqueness) violation
    pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
        matches!(
            e.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        )
    }
}
