//! Error types for scene operations.

use thiserror::Error;

/// Result type for scene operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in scene operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The payload was malformed or violated the element schema.
    #[error("{0}")]
    InvalidArgument(String),

    /// Element or snapshot not found.
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Shorthand for an unknown-element error.
    #[must_use]
    pub fn element_not_found(id: &str) -> Self {
        Self::NotFound("Element", id.to_string())
    }

    /// Shorthand for an unknown-snapshot error.
    #[must_use]
    pub fn snapshot_not_found(name: &str) -> Self {
        Self::NotFound("Snapshot", name.to_string())
    }
}
