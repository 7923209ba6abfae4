//! Error types for the resilience layer.

use crate::config::ConfigurationError;
use crate::store::StoreError;
use crate::warmer::WarmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
    #[error("Remote store error: {0}")]
    RemoteStore(#[from] StoreError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Cache warming error: {0}")]
    Warming(#[from] WarmError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Cache loader failed: {0:#}")]
    Loader(anyhow::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ResilienceError {
    fn from(error: serde_json::Error) -> Self {
        ResilienceError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl<E: std::fmt::Display> From<crate::resilience::CircuitBreakerError<E>> for ResilienceError {
    fn from(error: crate::resilience::CircuitBreakerError<E>) -> Self {
        match error {
            crate::resilience::CircuitBreakerError::CircuitOpen { component } => {
                ResilienceError::CircuitOpen(component)
            }
            crate::resilience::CircuitBreakerError::OperationFailed(e) => {
                ResilienceError::Internal(format!("protected operation failed: {e}"))
            }
        }
    }
}

pub type ResilienceResult<T> = Result<T, ResilienceError>;
