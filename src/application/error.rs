//! Application-level errors (wraps domain and store errors)

use thiserror::Error;

use crate::domain::TreeError;
use crate::infrastructure::StoreError;

/// Application errors wrap domain errors and store failures.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    /// The invariant violation behind this error, if it is one.
    pub fn tree_error(&self) -> Option<&TreeError> {
        match self {
            Self::Tree(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
