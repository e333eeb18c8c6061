//! Request parameter normalization
//!
//! Turns a caller's [`QueryParams`] into [`NormalizedParams`]: defaults are
//! filled in, structural limits are enforced, and filter lists are put into
//! canonical order so that equivalent requests share one cache entry.

use chrono::{Duration, NaiveDate, Utc};
use domain::{
    DEFAULT_LIMIT, DetailLevel, DomainError, NormalizedParams, PharmacyId, ProductCode,
    QueryParams,
};
use serde::{Deserialize, Serialize};

const fn default_max_range_days() -> i64 {
    365
}

const fn default_max_pharmacies() -> usize {
    100
}

const fn default_max_products() -> usize {
    1000
}

const fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

const fn default_max_limit() -> u32 {
    100
}

/// Structural bounds on revenue requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiLimits {
    /// Longest accepted window, counting both endpoints
    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,

    #[serde(default = "default_max_pharmacies")]
    pub max_pharmacies: usize,

    #[serde(default = "default_max_products")]
    pub max_products: usize,

    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for KpiLimits {
    fn default() -> Self {
        Self {
            max_range_days: default_max_range_days(),
            max_pharmacies: default_max_pharmacies(),
            max_products: default_max_products(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Validates and canonicalizes request parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterNormalizer {
    limits: KpiLimits,
}

impl ParameterNormalizer {
    #[must_use]
    pub const fn new(limits: KpiLimits) -> Self {
        Self { limits }
    }

    pub const fn limits(&self) -> &KpiLimits {
        &self.limits
    }

    /// Normalize against today's UTC date
    pub fn normalize(&self, params: QueryParams) -> Result<NormalizedParams, DomainError> {
        self.normalize_at(params, Utc::now().date_naive())
    }

    /// Normalize with an explicit reference date for the default window
    ///
    /// Unless both dates are given, the window becomes the trailing
    /// `max_range_days` ending at `today`. A lone start or end date is
    /// discarded rather than mixed with a default.
    pub fn normalize_at(
        &self,
        params: QueryParams,
        today: NaiveDate,
    ) -> Result<NormalizedParams, DomainError> {
        let pharmacies = self.pharmacy_ids(&params.pharmacy_ids.unwrap_or_default())?;
        let products = self.product_codes(params.ean13s.unwrap_or_default())?;
        let limit = self.limit(params.limit)?;
        let cursor = params
            .cursor
            .map(|c| {
                ProductCode::new(c.clone())
                    .map_err(|_| DomainError::validation("cursor", format!("'{c}' is not a product code")))
            })
            .transpose()?;

        let (start, end) = match (params.start_date, params.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => (today - Duration::days(self.limits.max_range_days - 1), today),
        };

        let normalized = NormalizedParams::new(start, end)?;

        let days = normalized.period().days;
        if days > self.limits.max_range_days {
            return Err(DomainError::validation(
                "endDate",
                format!(
                    "range of {days} days exceeds the maximum of {}",
                    self.limits.max_range_days
                ),
            ));
        }

        Ok(normalized
            .with_detail(params.detail.unwrap_or(DetailLevel::Summary))
            .with_pharmacies(pharmacies)
            .with_products(products)
            .with_limit(limit)
            .with_cursor(cursor))
    }

    /// Parse and deduplicate; the size limit applies to distinct ids
    fn pharmacy_ids(&self, raw: &[String]) -> Result<Vec<PharmacyId>, DomainError> {
        let mut ids = raw
            .iter()
            .map(|id| {
                PharmacyId::parse(id).map_err(|_| {
                    DomainError::validation("pharmacyIds", format!("'{id}' is not a UUID"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        ids.dedup();

        if ids.len() > self.limits.max_pharmacies {
            return Err(DomainError::validation(
                "pharmacyIds",
                format!("at most {} pharmacies allowed", self.limits.max_pharmacies),
            ));
        }
        Ok(ids)
    }

    fn product_codes(&self, raw: Vec<String>) -> Result<Vec<ProductCode>, DomainError> {
        let mut codes = raw
            .into_iter()
            .map(|code| {
                ProductCode::new(code.clone()).map_err(|_| {
                    DomainError::validation("ean13s", format!("'{code}' is not a 13 character code"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        codes.sort_unstable();
        codes.dedup();

        if codes.len() > self.limits.max_products {
            return Err(DomainError::validation(
                "ean13s",
                format!("at most {} product codes allowed", self.limits.max_products),
            ));
        }
        Ok(codes)
    }

    fn limit(&self, raw: Option<u32>) -> Result<u32, DomainError> {
        match raw {
            None => Ok(self.limits.default_limit),
            Some(limit) if (1..=self.limits.max_limit).contains(&limit) => Ok(limit),
            Some(limit) => Err(DomainError::validation(
                "limit",
                format!("{limit} is outside 1..={}", self.limits.max_limit),
            )),
        }
    }
}
