//! Revenue (CA) reports at the four detail levels
//!
//! Reports are built from unrounded [`SalesTotals`], [`PharmacyTotals`] and
//! [`ProductTotals`]. All currency values and percentages are rounded to two
//! decimals here and nowhere earlier.

use serde::{Deserialize, Serialize};

use super::{
    query_params::Period,
    sales_totals::{PharmacyTotals, ProductTotals, SalesTotals},
};
use crate::{
    money::{average, percentage, round2},
    value_objects::{DetailLevel, PharmacyId, ProductCode},
};

const UNKNOWN_PHARMACY: &str = "Unknown pharmacy";
const UNKNOWN_AREA: &str = "Unknown area";
const UNKNOWN_PRODUCT: &str = "Unknown product";
const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub pharmacies: u64,
    pub products: u64,
    pub transactions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Averages {
    #[serde(rename = "dailyCA")]
    pub daily_ca: f64,
    pub transaction_value: f64,
}

/// Aggregate totals for the whole window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    #[serde(rename = "totalCA")]
    pub total_ca: f64,
    pub period: Period,
    pub counts: Counts,
    pub averages: Averages,
}

impl SummaryReport {
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_totals(totals: &SalesTotals, period: Period) -> Self {
        Self {
            total_ca: round2(totals.revenue),
            period,
            counts: Counts {
                pharmacies: totals.pharmacy_count,
                products: totals.product_count,
                transactions: totals.transaction_count,
            },
            averages: Averages {
                daily_ca: average(totals.revenue, period.days.max(0) as u64),
                transaction_value: average(totals.revenue, totals.transaction_count),
            },
        }
    }
}

/// One ranked row of a per-pharmacy breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyRow {
    pub pharmacy_id: PharmacyId,
    pub name: String,
    pub area: String,
    pub ca: f64,
    pub percentage: f64,
    pub transaction_count: u64,
    pub average_transaction_value: f64,
    pub rank: u32,
}

/// Per-pharmacy breakdown, highest revenue first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyReport {
    #[serde(rename = "totalCA")]
    pub total_ca: f64,
    pub period: Period,
    pub by_pharmacy: Vec<PharmacyRow>,
}

impl PharmacyReport {
    /// Rank rows by revenue descending; ties are broken by pharmacy id
    #[must_use]
    pub fn from_rows(mut rows: Vec<PharmacyTotals>, period: Period) -> Self {
        rows.sort_by(|a, b| {
            b.revenue
                .total_cmp(&a.revenue)
                .then_with(|| a.pharmacy_id.cmp(&b.pharmacy_id))
        });

        let total: f64 = rows.iter().map(|r| r.revenue).sum();

        let by_pharmacy = rows
            .into_iter()
            .zip(1u32..)
            .map(|(row, rank)| PharmacyRow {
                pharmacy_id: row.pharmacy_id,
                name: row.name.unwrap_or_else(|| UNKNOWN_PHARMACY.to_string()),
                area: row.area.unwrap_or_else(|| UNKNOWN_AREA.to_string()),
                ca: round2(row.revenue),
                percentage: percentage(row.revenue, total),
                transaction_count: row.transaction_count,
                average_transaction_value: average(row.revenue, row.transaction_count),
                rank,
            })
            .collect();

        Self {
            total_ca: round2(total),
            period,
            by_pharmacy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub ean13: ProductCode,
    pub name: String,
    pub category: String,
    pub ca: f64,
    pub quantity: i64,
    pub average_price: f64,
    pub percentage: f64,
}

impl ProductRow {
    fn shape_all(rows: Vec<ProductTotals>, total: f64) -> Vec<Self> {
        rows.into_iter()
            .map(|row| Self {
                ean13: row.code,
                name: row.name.unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
                category: row.category.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                ca: round2(row.revenue),
                quantity: row.quantity,
                average_price: round2(row.average_price),
                percentage: percentage(row.revenue, total),
            })
            .collect()
    }

    /// The `limit` best sellers, revenue descending, ties by code
    ///
    /// Percentages are relative to the listed products only.
    #[must_use]
    pub fn top(mut rows: Vec<ProductTotals>, limit: u32) -> Vec<Self> {
        rows.sort_by(|a, b| {
            b.revenue
                .total_cmp(&a.revenue)
                .then_with(|| a.code.cmp(&b.code))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        let total: f64 = rows.iter().map(|r| r.revenue).sum();
        Self::shape_all(rows, total)
    }
}

/// Keyset pagination state of a product page
///
/// There is no total row count: `has_more` comes from one look-ahead row, so a
/// page never costs a second counting query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Code of the last row on this page, present only when `has_more`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<ProductCode>,
    pub has_more: bool,
    pub limit: u32,
}

/// One page of the per-product breakdown, ordered by product code
///
/// Percentages are relative to the page total, not the whole window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReport {
    #[serde(rename = "totalCA")]
    pub total_ca: f64,
    pub period: Period,
    pub by_product: Vec<ProductRow>,
    pub pagination: Pagination,
}

impl ProductReport {
    /// Build a page from up to `limit + 1` rows
    ///
    /// The extra row, when present, only signals that another page exists and
    /// is dropped from the output.
    #[must_use]
    pub fn from_page(mut rows: Vec<ProductTotals>, period: Period, limit: u32) -> Self {
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let page_len = usize::try_from(limit).unwrap_or(usize::MAX);
        let has_more = rows.len() > page_len;
        rows.truncate(page_len);

        let cursor = if has_more {
            rows.last().map(|r| r.code.clone())
        } else {
            None
        };

        let total: f64 = rows.iter().map(|r| r.revenue).sum();
        let by_product = ProductRow::shape_all(rows, total);

        Self {
            total_ca: round2(total),
            period,
            by_product,
            pagination: Pagination {
                cursor,
                has_more,
                limit,
            },
        }
    }
}

/// Summary, per-pharmacy and top-product views of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullReport {
    #[serde(flatten)]
    pub summary: SummaryReport,
    pub by_pharmacy: Vec<PharmacyRow>,
    pub by_product: Vec<ProductRow>,
}

impl FullReport {
    #[must_use]
    pub fn assemble(
        summary: SummaryReport,
        pharmacies: PharmacyReport,
        top_products: Vec<ProductRow>,
    ) -> Self {
        Self {
            summary,
            by_pharmacy: pharmacies.by_pharmacy,
            by_product: top_products,
        }
    }
}

/// A report at any detail level, tagged with its level on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "detail", rename_all = "lowercase")]
pub enum CaReport {
    Summary(SummaryReport),
    Pharmacy(PharmacyReport),
    Product(ProductReport),
    Full(FullReport),
}

impl CaReport {
    #[must_use]
    pub const fn detail(&self) -> DetailLevel {
        match self {
            Self::Summary(_) => DetailLevel::Summary,
            Self::Pharmacy(_) => DetailLevel::Pharmacy,
            Self::Product(_) => DetailLevel::Product,
            Self::Full(_) => DetailLevel::Full,
        }
    }

    /// Rounded total revenue of the report
    #[must_use]
    pub const fn total_ca(&self) -> f64 {
        match self {
            Self::Summary(r) => r.total_ca,
            Self::Pharmacy(r) => r.total_ca,
            Self::Product(r) => r.total_ca,
            Self::Full(r) => r.summary.total_ca,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    fn january() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    fn pharmacy_row(n: u128, revenue: f64, transactions: u64) -> PharmacyTotals {
        PharmacyTotals {
            pharmacy_id: PharmacyId::from_uuid(Uuid::from_u128(n)),
            name: Some(format!("Pharmacy {n}")),
            area: None,
            revenue,
            transaction_count: transactions,
        }
    }

    fn product_row(suffix: u32, revenue: f64) -> ProductTotals {
        ProductTotals {
            code: ProductCode::new(format!("340093{suffix:07}")).unwrap(),
            name: None,
            category: Some("OTC".to_string()),
            revenue,
            quantity: 1,
            average_price: revenue,
        }
    }

    #[test]
    fn summary_computes_averages() {
        let totals = SalesTotals {
            revenue: 3100.0,
            pharmacy_count: 2,
            product_count: 5,
            transaction_count: 40,
        };
        let report = SummaryReport::from_totals(&totals, january());
        assert!((report.total_ca - 3100.0).abs() < f64::EPSILON);
        assert!((report.averages.daily_ca - 100.0).abs() < f64::EPSILON);
        assert!((report.averages.transaction_value - 77.5).abs() < f64::EPSILON);
        assert_eq!(report.counts.transactions, 40);
    }

    #[test]
    fn summary_without_transactions_has_zero_averages() {
        let report = SummaryReport::from_totals(&SalesTotals::default(), january());
        assert!(report.total_ca.abs() < f64::EPSILON);
        assert!(report.averages.transaction_value.abs() < f64::EPSILON);
    }

    #[test]
    fn pharmacies_are_ranked_by_revenue() {
        let report = PharmacyReport::from_rows(
            vec![pharmacy_row(1, 400.0, 4), pharmacy_row(2, 600.0, 3)],
            january(),
        );

        assert!((report.total_ca - 1000.0).abs() < f64::EPSILON);
        let first = &report.by_pharmacy[0];
        assert_eq!(first.pharmacy_id, PharmacyId::from_uuid(Uuid::from_u128(2)));
        assert_eq!(first.rank, 1);
        assert!((first.percentage - 60.0).abs() < f64::EPSILON);
        assert!((first.average_transaction_value - 200.0).abs() < f64::EPSILON);
        assert_eq!(report.by_pharmacy[1].rank, 2);
        assert!((report.by_pharmacy[1].percentage - 40.0).abs() < f64::EPSILON);
        assert_eq!(report.by_pharmacy[1].area, UNKNOWN_AREA);
    }

    #[test]
    fn revenue_ties_are_broken_by_id() {
        let report = PharmacyReport::from_rows(
            vec![pharmacy_row(9, 100.0, 1), pharmacy_row(3, 100.0, 1)],
            january(),
        );
        assert_eq!(
            report.by_pharmacy[0].pharmacy_id,
            PharmacyId::from_uuid(Uuid::from_u128(3))
        );
    }

    #[test]
    fn zero_total_yields_zero_percentages() {
        let report = PharmacyReport::from_rows(
            vec![pharmacy_row(1, 0.0, 0), pharmacy_row(2, 0.0, 0)],
            january(),
        );
        assert!(report.by_pharmacy.iter().all(|r| r.percentage.abs() < f64::EPSILON));
    }

    #[test]
    fn product_page_with_extra_row_has_more() {
        let rows = (1..=21).map(|i| product_row(i, 10.0)).collect();
        let report = ProductReport::from_page(rows, january(), 20);

        assert_eq!(report.by_product.len(), 20);
        assert!(report.pagination.has_more);
        assert_eq!(
            report.pagination.cursor.as_ref().map(ProductCode::as_str),
            Some("3400930000020")
        );
        assert!((report.total_ca - 200.0).abs() < f64::EPSILON);
        assert!((report.by_product[0].percentage - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn last_product_page_has_no_cursor() {
        let rows = (1..=3).map(|i| product_row(i, 10.0)).collect();
        let report = ProductReport::from_page(rows, january(), 20);

        assert_eq!(report.by_product.len(), 3);
        assert!(!report.pagination.has_more);
        assert!(report.pagination.cursor.is_none());
        assert_eq!(report.by_product[0].name, UNKNOWN_PRODUCT);
    }

    #[test]
    fn top_products_rank_by_revenue_not_code() {
        let rows = vec![
            product_row(1, 1.0),
            product_row(9, 5000.0),
            product_row(5, 40.0),
            product_row(3, 40.0),
        ];
        let top = ProductRow::top(rows, 3);

        let codes: Vec<&str> = top.iter().map(|r| r.ean13.as_str()).collect();
        assert_eq!(codes, ["3400930000009", "3400930000003", "3400930000005"]);
        assert!((top[0].percentage - 98.43).abs() < f64::EPSILON);
    }

    #[test]
    fn pagination_wire_shape_has_no_total() {
        let rows = (1..=3).map(|i| product_row(i, 10.0)).collect();
        let report = ProductReport::from_page(rows, january(), 2);

        let json = serde_json::to_value(&report.pagination).unwrap();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["limit"], 2);
        assert_eq!(json["cursor"], "3400930000002");
        assert!(json.get("total").is_none());
    }

    #[test]
    fn report_serializes_with_detail_tag() {
        let report = CaReport::Summary(SummaryReport::from_totals(
            &SalesTotals::default(),
            january(),
        ));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["detail"], "summary");
        assert!(json.get("totalCA").is_some());
        assert!(json["averages"].get("dailyCA").is_some());
    }

    #[test]
    fn full_report_round_trips_through_json() {
        let summary = SummaryReport::from_totals(&SalesTotals::default(), january());
        let pharmacies = PharmacyReport::from_rows(vec![pharmacy_row(1, 10.0, 1)], january());
        let products = ProductRow::top(vec![product_row(1, 10.0)], 50);
        let report = CaReport::Full(FullReport::assemble(summary, pharmacies, products));

        let json = serde_json::to_string(&report).unwrap();
        let back: CaReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.detail(), DetailLevel::Full);
        assert_eq!(back, report);
    }
}
