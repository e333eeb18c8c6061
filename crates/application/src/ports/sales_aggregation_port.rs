//! Sales aggregation port
//!
//! The backing store that turns a canonical parameter set into unrounded
//! revenue aggregates. Output must be a pure function of the parameters and
//! the underlying data.

use async_trait::async_trait;
use domain::{DetailLevel, NormalizedParams, PharmacyTotals, ProductTotals, SalesTotals};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Errors raised by the sales store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage connection error: {0}")]
    Connection(String),

    #[error("Storage query failed: {0}")]
    Query(String),

    #[error("Storage returned malformed data: {0}")]
    Decode(String),
}

/// Raw aggregate for one detail level
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationPayload {
    Summary(SalesTotals),
    Pharmacies(Vec<PharmacyTotals>),
    /// Rows ordered by product code, strictly after the cursor, at most
    /// `limit + 1` of them
    Products(Vec<ProductTotals>),
}

/// Port for running revenue aggregations against sales data
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SalesAggregationPort: Send + Sync {
    /// Aggregate sales in the window and filters of `params` at one level
    ///
    /// `level` is never [`DetailLevel::Full`]; full reports are assembled
    /// from the summary, the pharmacy breakdown and [`Self::top_products`].
    async fn run_aggregation(
        &self,
        params: &NormalizedParams,
        level: DetailLevel,
    ) -> Result<AggregationPayload, StorageError>;

    /// At most `limit` products of the window, highest revenue first
    ///
    /// Ties are ordered by product code. Any cursor in `params` is ignored.
    async fn top_products(
        &self,
        params: &NormalizedParams,
        limit: u32,
    ) -> Result<Vec<ProductTotals>, StorageError>;
}
