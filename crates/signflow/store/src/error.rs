use signflow_types::SigningError;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for SigningError {
    fn from(err: StoreError) -> Self {
        SigningError::Storage(err.to_string())
    }
}
