//! Provider error types

use thiserror::Error;

/// Cloud provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Provider call {operation} failed: {reason}")]
    CallFailed { operation: String, reason: String },

    #[error("Provider call {operation} timed out")]
    Timeout { operation: String },
}

impl ProviderError {
    pub fn call_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
