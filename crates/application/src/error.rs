//! Application-level errors

use domain::DomainError;
use thiserror::Error;

use crate::ports::StorageError;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error, including request validation failures
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A value handed to an internal component was not well formed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing sales store failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Whether the caller sent an invalid request
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    /// Request field blamed for a validation failure
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Domain(err) => err.field(),
            _ => None,
        }
    }
}
