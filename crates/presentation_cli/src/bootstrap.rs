//! Composition root
//!
//! Turns an [`AppConfig`] into a ready [`CaKpiService`]: tiered cache, sales
//! database and every tunable the configuration exposes.

use std::sync::Arc;

use anyhow::{Context, Result};
use application::{
    AggregationDispatcher, CaKeyBuilder, CaKpiService, ParameterNormalizer, SalesAggregationPort,
};
use infrastructure::{AppConfig, AsyncDatabase, SqliteSalesStore, TieredCache};
use tracing::info;

/// A wired service plus the resources it holds open
#[derive(Debug)]
pub struct Runtime {
    pub service: CaKpiService,
    database: AsyncDatabase,
}

impl Runtime {
    /// Release the database pool
    pub async fn shutdown(self) {
        self.database.close().await;
    }
}

/// Connect every adapter and assemble the service
pub async fn build(config: &AppConfig) -> Result<Runtime> {
    let cache = TieredCache::connect(&config.cache).await;

    let database = AsyncDatabase::new(&config.database.pool_config())
        .await
        .with_context(|| format!("Failed to open sales database {}", config.database.url))?;
    if config.database.run_migrations {
        database
            .migrate()
            .await
            .context("Failed to migrate sales database")?;
    }

    let store: Arc<dyn SalesAggregationPort> =
        Arc::new(SqliteSalesStore::new(database.pool().clone()));
    let kpi = &config.kpi;

    let service = CaKpiService::new(Arc::new(cache), Arc::clone(&store))
        .with_key_builder(Arc::new(CaKeyBuilder::new(kpi.hash_thresholds)))
        .with_ttl_policy(config.cache.ttl)
        .with_normalizer(ParameterNormalizer::new(kpi.limits))
        .with_dispatcher(
            AggregationDispatcher::new(store).with_full_product_limit(kpi.full_product_limit),
        );

    info!(
        backend = %config.cache.backend,
        namespace = %config.cache.namespace,
        "Revenue analytics service ready"
    );

    Ok(Runtime { service, database })
}

#[cfg(test)]
mod tests {
    use domain::{CaReport, QueryParams};
    use infrastructure::RemoteBackend;

    use super::*;

    fn in_memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.cache.backend = RemoteBackend::None;
        config.database.url = "sqlite::memory:".to_string();
        config
    }

    #[tokio::test]
    async fn builds_against_an_empty_database() {
        let runtime = build(&in_memory_config()).await.unwrap();

        let envelope = runtime.service.calculate(QueryParams::new()).await.unwrap();
        let CaReport::Summary(summary) = envelope.data else {
            panic!("expected summary report");
        };
        assert!(summary.total_ca.abs() < f64::EPSILON);
        assert_eq!(summary.counts.transactions, 0);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn configured_limits_reach_the_normalizer() {
        let mut config = in_memory_config();
        config.kpi.limits.max_limit = 5;
        let runtime = build(&config).await.unwrap();

        let err = runtime
            .service
            .calculate(QueryParams::new().with_limit(6))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn unreachable_database_is_reported() {
        let mut config = in_memory_config();
        config.database.url = "sqlite:/nonexistent-dir/ca.db".to_string();

        let err = build(&config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to open sales database"));
    }
}
