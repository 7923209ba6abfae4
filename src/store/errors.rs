//! Remote store error types

use thiserror::Error;

/// Errors that can occur while talking to the remote (L2) store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Failed to connect to the store backend
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a stored value
    #[error("Store serialization error: {0}")]
    SerializationError(String),

    /// Store operation timed out
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Store backend error: {0}")]
    BackendError(String),
}

impl StoreError {
    /// Whether this error indicates an infrastructure problem.
    ///
    /// Only transient errors count toward tripping a circuit breaker; a value
    /// that fails to decode says nothing about the store's availability.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::SerializationError(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::SerializationError(error.to_string())
    }
}

/// Result type for remote store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::ConnectionError("down".into()).is_transient());
        assert!(StoreError::Timeout("slow".into()).is_transient());
        assert!(StoreError::BackendError("oops".into()).is_transient());
        assert!(!StoreError::SerializationError("bad json".into()).is_transient());
    }
}
