//! Application services - Use case implementations

mod aggregation_dispatcher;
mod ca_kpi_service;
mod invalidation;
mod normalizer;
mod ttl_policy;

pub use aggregation_dispatcher::AggregationDispatcher;
pub use ca_kpi_service::{CaKpiService, WarmReport, WarmTarget, warm_targets};
pub use invalidation::{InvalidationCoordinator, InvalidationTrigger};
pub use normalizer::{KpiLimits, ParameterNormalizer};
pub use ttl_policy::TtlPolicy;
