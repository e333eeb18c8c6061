//! Freshness lifetime per detail level

use std::time::Duration;

use domain::DetailLevel;
use serde::{Deserialize, Serialize};

const fn default_summary_secs() -> u64 {
    3600
}

const fn default_pharmacy_secs() -> u64 {
    1800
}

const fn default_product_secs() -> u64 {
    900
}

const fn default_full_secs() -> u64 {
    600
}

/// TTL lookup table, in seconds per detail level
///
/// Cheaper, coarser aggregates live longer than expensive detailed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPolicy {
    #[serde(default = "default_summary_secs")]
    pub summary_secs: u64,

    #[serde(default = "default_pharmacy_secs")]
    pub pharmacy_secs: u64,

    #[serde(default = "default_product_secs")]
    pub product_secs: u64,

    #[serde(default = "default_full_secs")]
    pub full_secs: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            summary_secs: default_summary_secs(),
            pharmacy_secs: default_pharmacy_secs(),
            product_secs: default_product_secs(),
            full_secs: default_full_secs(),
        }
    }
}

impl TtlPolicy {
    /// Lifetime of a cached result at `detail`
    #[must_use]
    pub const fn ttl_for(&self, detail: DetailLevel) -> Duration {
        let secs = match detail {
            DetailLevel::Summary => self.summary_secs,
            DetailLevel::Pharmacy => self.pharmacy_secs,
            DetailLevel::Product => self.product_secs,
            DetailLevel::Full => self.full_secs,
        };
        Duration::from_secs(secs)
    }
}
