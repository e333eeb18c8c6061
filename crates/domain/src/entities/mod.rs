//! Domain entities - revenue queries and the reports answering them

mod ca_report;
mod query_params;
mod sales_totals;

pub use ca_report::{
    Averages, CaReport, Counts, FullReport, Pagination, PharmacyReport, PharmacyRow, ProductReport,
    ProductRow, SummaryReport,
};
pub use query_params::{DEFAULT_LIMIT, NormalizedParams, Period, QueryParams};
pub use sales_totals::{PharmacyTotals, ProductTotals, SalesTotals};
