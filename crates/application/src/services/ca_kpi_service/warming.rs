//! Cache warming for the most requested report shapes

use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use domain::{DetailLevel, QueryParams};
use tracing::{info, instrument, warn};

use super::CaKpiService;
use crate::error::ApplicationError;

/// A request worth having in cache before anyone asks for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmTarget {
    pub label: &'static str,
    pub params: QueryParams,
}

/// Outcome of one warming run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    /// Targets computed and stored by this run
    pub computed: usize,
    /// Targets that already had a live entry
    pub already_cached: usize,
    pub failed: usize,
}

impl WarmReport {
    /// Targets that now have a live cache entry
    pub const fn warmed(&self) -> usize {
        self.computed + self.already_cached
    }
}

/// High-frequency request shapes relative to `today`
///
/// Windows are inclusive, so the trailing 30 days start 29 days before
/// `today`. Top products come from the full report, the only view ranked by
/// product revenue.
///
/// Year-to-date and month-to-date windows are empty on the first day of the
/// year or month; those targets fail validation and are reported as failed.
pub fn warm_targets(today: NaiveDate) -> Vec<WarmTarget> {
    let year_start = today.with_ordinal(1).unwrap_or(today);
    let month_start = today.with_day(1).unwrap_or(today);

    vec![
        WarmTarget {
            label: "global summary",
            params: QueryParams::new().with_detail(DetailLevel::Summary),
        },
        WarmTarget {
            label: "year-to-date summary",
            params: QueryParams::new()
                .with_detail(DetailLevel::Summary)
                .with_range(year_start, today),
        },
        WarmTarget {
            label: "month-to-date by pharmacy",
            params: QueryParams::new()
                .with_detail(DetailLevel::Pharmacy)
                .with_range(month_start, today),
        },
        WarmTarget {
            label: "last 30 days top products",
            params: QueryParams::new()
                .with_detail(DetailLevel::Full)
                .with_range(today - Duration::days(29), today),
        },
    ]
}

impl CaKpiService {
    /// Warm the cache for today's targets; returns how many are now cached
    pub async fn warm(&self) -> usize {
        self.warm_at(Utc::now().date_naive()).await.warmed()
    }

    /// Warm every target relative to `today`
    ///
    /// A failing target is logged and skipped; it never stops the others.
    #[instrument(skip(self))]
    pub async fn warm_at(&self, today: NaiveDate) -> WarmReport {
        let targets = warm_targets(today);
        let total = targets.len();
        let mut report = WarmReport::default();

        for target in targets {
            match self.warm_one(target.params, today).await {
                Ok(true) => report.computed += 1,
                Ok(false) => report.already_cached += 1,
                Err(e) => {
                    warn!(target = target.label, error = %e, "Failed to warm cache target");
                    report.failed += 1;
                },
            }
        }

        info!(
            warmed = report.warmed(),
            computed = report.computed,
            failed = report.failed,
            total,
            "Cache warming complete"
        );
        report
    }

    /// Returns `true` when the target had to be computed
    async fn warm_one(&self, params: QueryParams, today: NaiveDate) -> Result<bool, ApplicationError> {
        let started = Instant::now();
        let params = self.normalizer.normalize_at(params, today)?;
        let key = self.keys.build_key(&params)?;

        if self.cache.exists(key.as_str()).await {
            return Ok(false);
        }

        self.compute_and_store(params, key, started).await?;
        Ok(true)
    }
}
