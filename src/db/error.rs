use thiserror::Error;

// DbError is the lowest level error type, wrapping errors from the persistence layer. It does not wrap
// any higher level errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Record not found
    #[error("not found")]
    NotFound,

    /// Unique constraint violation (e.g. duplicate character name)
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("document decode error: {0}")]
    Decode(String),
}
