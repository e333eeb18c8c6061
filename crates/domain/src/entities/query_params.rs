//! Revenue query parameters, raw and canonical

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    errors::DomainError,
    value_objects::{DetailLevel, PharmacyId, ProductCode},
};

/// Page size applied when a request carries no limit
pub const DEFAULT_LIMIT: u32 = 20;

/// Filter set as supplied by a caller, before any validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    pub pharmacy_ids: Option<Vec<String>>,
    pub ean13s: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub detail: Option<DetailLevel>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl QueryParams {
    /// Parameters with every field left to its default
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub const fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    #[must_use]
    pub fn with_pharmacy_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pharmacy_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_ean13s<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ean13s = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// Canonical, validated form of [`QueryParams`]
///
/// Dates and detail level are always populated, filter lists are sorted and
/// deduplicated. Two requests that mean the same thing compare equal no matter
/// how their lists were ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedParams {
    start_date: NaiveDate,
    end_date: NaiveDate,
    detail: DetailLevel,
    pharmacy_ids: Vec<PharmacyId>,
    product_codes: Vec<ProductCode>,
    limit: u32,
    cursor: Option<ProductCode>,
}

impl NormalizedParams {
    /// Start a canonical parameter set for the inclusive window `[start, end]`
    ///
    /// # Errors
    ///
    /// Returns a validation error on `endDate` unless `end` is strictly after
    /// `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::validation(
                "endDate",
                format!("end date {end} must be after start date {start}"),
            ));
        }

        Ok(Self {
            start_date: start,
            end_date: end,
            detail: DetailLevel::default(),
            pharmacy_ids: Vec::new(),
            product_codes: Vec::new(),
            limit: DEFAULT_LIMIT,
            cursor: None,
        })
    }

    #[must_use]
    pub const fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }

    /// Replace the pharmacy filter; the list is sorted and deduplicated
    #[must_use]
    pub fn with_pharmacies(mut self, ids: impl IntoIterator<Item = PharmacyId>) -> Self {
        let mut ids: Vec<_> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        self.pharmacy_ids = ids;
        self
    }

    /// Replace the product filter; the list is sorted and deduplicated
    #[must_use]
    pub fn with_products(mut self, codes: impl IntoIterator<Item = ProductCode>) -> Self {
        let mut codes: Vec<_> = codes.into_iter().collect();
        codes.sort_unstable();
        codes.dedup();
        self.product_codes = codes;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<ProductCode>) -> Self {
        self.cursor = cursor;
        self
    }

    pub const fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub const fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub const fn detail(&self) -> DetailLevel {
        self.detail
    }

    /// Sorted pharmacy filter, empty when unfiltered
    pub fn pharmacy_ids(&self) -> &[PharmacyId] {
        &self.pharmacy_ids
    }

    /// Sorted product filter, empty when unfiltered
    pub fn product_codes(&self) -> &[ProductCode] {
        &self.product_codes
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Exclusive lower bound on product codes for the next page
    pub const fn cursor(&self) -> Option<&ProductCode> {
        self.cursor.as_ref()
    }

    /// Reporting period covered by these parameters
    pub fn period(&self) -> Period {
        Period::new(self.start_date, self.end_date)
    }
}

/// Inclusive calendar window of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

impl Period {
    /// Build a period; `days` counts both endpoints
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            days: (end - start).num_days() + 1,
        }
    }

    /// Whether two inclusive windows share at least one day
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && start <= self.end
    }
}
