//! Maps data-change events to cache purges

use std::{fmt, sync::Arc};

use chrono::NaiveDate;
use domain::{Period, PharmacyId, ProductCode};
use tracing::{info, instrument};

use crate::{
    cache_key::{ALL_KEYS_PATTERN, parse_period},
    ports::CachePort,
};

/// An event that makes cached reports stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTrigger {
    /// Sales or metadata of one pharmacy changed
    Pharmacy(PharmacyId),
    /// Sales or metadata of one product changed
    Product(ProductCode),
    /// Data for an inclusive date window changed
    Period { start: NaiveDate, end: NaiveDate },
    /// Drop every cached report
    All,
}

impl fmt::Display for InvalidationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pharmacy(id) => write!(f, "pharmacy {id}"),
            Self::Product(code) => write!(f, "product {code}"),
            Self::Period { start, end } => write!(f, "period {start}..={end}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// Pharmacy-scoped and unscoped keys alike, since a pharmacy change moves
/// global totals too
const PHARMACY_PATTERNS: [&str; 2] = ["ca:*:ph:*", "ca:*:ph:all:*"];
const PRODUCT_PATTERNS: [&str; 2] = ["ca:*:ean:*", "ca:*:ean:all:*"];

/// Purges cache entries affected by an [`InvalidationTrigger`]
#[derive(Debug)]
pub struct InvalidationCoordinator {
    cache: Arc<dyn CachePort>,
}

impl InvalidationCoordinator {
    pub fn new(cache: Arc<dyn CachePort>) -> Self {
        Self { cache }
    }

    /// Remove every entry the trigger may have made stale
    ///
    /// Returns the number of removed keys. Each pattern is purged on its own;
    /// the cache absorbs backend failures, so one pattern never prevents the
    /// next.
    #[instrument(skip_all, fields(trigger = %trigger))]
    pub async fn invalidate(&self, trigger: &InvalidationTrigger) -> u64 {
        let removed = match trigger {
            InvalidationTrigger::Pharmacy(_) => self.purge_patterns(&PHARMACY_PATTERNS).await,
            InvalidationTrigger::Product(_) => self.purge_patterns(&PRODUCT_PATTERNS).await,
            InvalidationTrigger::Period { start, end } => {
                let (start, end) = (*start, *end);
                let overlaps = move |key: &str| {
                    parse_period(key).is_some_and(|(s, e)| Period::new(s, e).overlaps(start, end))
                };
                self.cache
                    .invalidate_where(ALL_KEYS_PATTERN, &overlaps)
                    .await
            },
            InvalidationTrigger::All => self.cache.invalidate_pattern(ALL_KEYS_PATTERN).await,
        };

        info!(removed, "Cache invalidated");
        removed
    }

    async fn purge_patterns(&self, patterns: &[&str]) -> u64 {
        let mut removed = 0;
        for pattern in patterns {
            removed += self.cache.invalidate_pattern(pattern).await;
        }
        removed
    }
}
