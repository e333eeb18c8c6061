//! Aggregation detail level

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Granularity of a requested revenue aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Single totals row
    #[default]
    Summary,
    /// Ranked per-pharmacy totals
    Pharmacy,
    /// Paginated per-product totals
    Product,
    /// Summary, pharmacies and top products together
    Full,
}

/// Relative cost of an aggregation, reported in response metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    Medium,
    Complex,
}

impl DetailLevel {
    /// All detail levels, cheapest first
    pub const ALL: [Self; 4] = [Self::Summary, Self::Pharmacy, Self::Product, Self::Full];

    /// Key segment and wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Pharmacy => "pharmacy",
            Self::Product => "product",
            Self::Full => "full",
        }
    }

    /// Fixed complexity class of this level
    #[must_use]
    pub const fn complexity(&self) -> QueryComplexity {
        match self {
            Self::Summary => QueryComplexity::Simple,
            Self::Pharmacy | Self::Product => QueryComplexity::Medium,
            Self::Full => QueryComplexity::Complex,
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetailLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "pharmacy" => Ok(Self::Pharmacy),
            "product" => Ok(Self::Product),
            "full" => Ok(Self::Full),
            _ => Err(DomainError::InvalidDetailLevel(s.to_string())),
        }
    }
}
