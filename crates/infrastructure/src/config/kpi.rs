//! Revenue KPI request bounds and key layout.

use application::{HashThresholds, KpiLimits};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiConfig {
    #[serde(default)]
    pub limits: KpiLimits,

    /// Filter list lengths above which cache keys carry a digest
    #[serde(default)]
    pub hash_thresholds: HashThresholds,

    /// Number of products listed in a full report
    #[serde(default = "default_full_product_limit")]
    pub full_product_limit: u32,
}

const fn default_full_product_limit() -> u32 {
    50
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            limits: KpiLimits::default(),
            hash_thresholds: HashThresholds::default(),
            full_product_limit: default_full_product_limit(),
        }
    }
}
