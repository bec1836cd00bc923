//! Infrastructure-level errors (row store failures)

use thiserror::Error;

/// Failures reported by a row store.
///
/// The engine surfaces these unchanged; rolling back the surrounding transaction is
/// the caller's job.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("row not found: #{0}")]
    RowNotFound(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("store does not support: {0}")]
    Unsupported(String),

    #[error("store failure: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Create a backend error with context.
    pub fn backend(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Result type for row store operations.
pub type StoreResult<T> = Result<T, StoreError>;
