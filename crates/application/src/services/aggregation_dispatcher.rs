//! Routes normalized requests to one aggregation strategy per detail level

use std::sync::Arc;

use domain::{
    CaReport, DetailLevel, FullReport, NormalizedParams, PharmacyReport, ProductReport,
    ProductRow, SummaryReport,
};
use tracing::{debug, instrument};

use crate::{
    error::ApplicationError,
    ports::{AggregationPayload, SalesAggregationPort},
};

/// Number of best-selling products included in a full report
const DEFAULT_FULL_PRODUCT_LIMIT: u32 = 50;

/// Turns storage aggregates into shaped reports
pub struct AggregationDispatcher {
    store: Arc<dyn SalesAggregationPort>,
    full_product_limit: u32,
}

impl std::fmt::Debug for AggregationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationDispatcher")
            .field("full_product_limit", &self.full_product_limit)
            .finish_non_exhaustive()
    }
}

impl AggregationDispatcher {
    pub fn new(store: Arc<dyn SalesAggregationPort>) -> Self {
        Self {
            store,
            full_product_limit: DEFAULT_FULL_PRODUCT_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_full_product_limit(mut self, limit: u32) -> Self {
        self.full_product_limit = limit;
        self
    }

    /// Compute the report for `params` at its own detail level
    #[instrument(skip(self, params), fields(detail = %params.detail()), level = "debug")]
    pub async fn dispatch(&self, params: &NormalizedParams) -> Result<CaReport, ApplicationError> {
        let report = match params.detail() {
            DetailLevel::Summary => CaReport::Summary(self.summary(params).await?),
            DetailLevel::Pharmacy => CaReport::Pharmacy(self.pharmacies(params).await?),
            DetailLevel::Product => CaReport::Product(self.products(params).await?),
            DetailLevel::Full => CaReport::Full(self.full(params).await?),
        };
        debug!(total_ca = report.total_ca(), "Aggregation complete");
        Ok(report)
    }

    async fn summary(&self, params: &NormalizedParams) -> Result<SummaryReport, ApplicationError> {
        match self.store.run_aggregation(params, DetailLevel::Summary).await? {
            AggregationPayload::Summary(totals) => {
                Ok(SummaryReport::from_totals(&totals, params.period()))
            },
            other => Err(unexpected(DetailLevel::Summary, &other)),
        }
    }

    async fn pharmacies(
        &self,
        params: &NormalizedParams,
    ) -> Result<PharmacyReport, ApplicationError> {
        match self.store.run_aggregation(params, DetailLevel::Pharmacy).await? {
            AggregationPayload::Pharmacies(rows) => {
                Ok(PharmacyReport::from_rows(rows, params.period()))
            },
            other => Err(unexpected(DetailLevel::Pharmacy, &other)),
        }
    }

    async fn products(&self, params: &NormalizedParams) -> Result<ProductReport, ApplicationError> {
        match self.store.run_aggregation(params, DetailLevel::Product).await? {
            AggregationPayload::Products(rows) => Ok(ProductReport::from_page(
                rows,
                params.period(),
                params.limit(),
            )),
            other => Err(unexpected(DetailLevel::Product, &other)),
        }
    }

    async fn top_products(
        &self,
        params: &NormalizedParams,
    ) -> Result<Vec<ProductRow>, ApplicationError> {
        let rows = self
            .store
            .top_products(params, self.full_product_limit)
            .await?;
        Ok(ProductRow::top(rows, self.full_product_limit))
    }

    /// Fan out the three partial aggregations; any failure fails the report
    async fn full(&self, params: &NormalizedParams) -> Result<FullReport, ApplicationError> {
        let (summary, pharmacies, products) = tokio::try_join!(
            self.summary(params),
            self.pharmacies(params),
            self.top_products(params),
        )?;

        Ok(FullReport::assemble(summary, pharmacies, products))
    }
}

fn unexpected(level: DetailLevel, payload: &AggregationPayload) -> ApplicationError {
    let got = match payload {
        AggregationPayload::Summary(_) => "summary",
        AggregationPayload::Pharmacies(_) => "pharmacies",
        AggregationPayload::Products(_) => "products",
    };
    ApplicationError::Internal(format!(
        "store answered a {level} aggregation with a {got} payload"
    ))
}
