//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod cache_port;
mod sales_aggregation_port;

#[cfg(test)]
pub(crate) use cache_port::fake;
pub use cache_port::{CacheError, CachePort, CachePortExt, CacheStats, KeyPredicate};
#[cfg(test)]
pub use sales_aggregation_port::MockSalesAggregationPort;
pub use sales_aggregation_port::{AggregationPayload, SalesAggregationPort, StorageError};
