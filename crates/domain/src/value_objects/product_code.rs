//! EAN13 product code value object

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::DomainError;

/// A 13 character product reference code (EAN13)
///
/// Codes are compared lexicographically, which is also the keyset order used
/// by paginated product breakdowns.
///
/// # Examples
///
/// ```
/// use domain::ProductCode;
///
/// let code = ProductCode::new("3400930000001").unwrap();
/// assert_eq!(code.as_str(), "3400930000001");
///
/// assert!(ProductCode::new("340093").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Validate)]
#[serde(try_from = "String", into = "String")]
pub struct ProductCode {
    #[validate(length(equal = 13))]
    value: String,
}

impl ProductCode {
    /// Create a product code, validating its shape
    ///
    /// # Errors
    ///
    /// Returns an error unless the trimmed input is exactly 13 ASCII
    /// alphanumeric characters.
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let raw = code.into();
        let candidate = Self {
            value: raw.trim().to_string(),
        };

        if candidate.validate().is_err() || !candidate.value.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DomainError::InvalidProductCode(raw));
        }

        Ok(candidate)
    }

    /// Get the code as a string slice
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl TryFrom<String> for ProductCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ProductCode {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductCode> for String {
    fn from(code: ProductCode) -> Self {
        code.value
    }
}
