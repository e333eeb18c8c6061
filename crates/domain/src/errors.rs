//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A request parameter failed structural validation
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Pharmacy identifier is not a UUID
    #[error("Invalid pharmacy id: {0}")]
    InvalidPharmacyId(String),

    /// Product code is not a 13 character EAN13
    #[error("Invalid product code: {0}")]
    InvalidProductCode(String),

    /// Unknown detail level
    #[error("Invalid detail level: {0}")]
    InvalidDetailLevel(String),
}

impl DomainError {
    /// Create a validation error for a named request field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The request field this error refers to
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::InvalidPharmacyId(_) => Some("pharmacyIds"),
            Self::InvalidProductCode(_) => Some("ean13s"),
            Self::InvalidDetailLevel(_) => Some("detail"),
        }
    }
}
