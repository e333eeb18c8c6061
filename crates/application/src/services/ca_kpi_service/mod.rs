//! Revenue (CA) KPI service
//!
//! Entry point for the analytics core: normalizes a request, looks it up in
//! the tiered cache and, on a miss, computes the report and stores it.
//! Administrative operations (warming, invalidation, statistics) are exposed
//! here as well.

mod warming;

use std::{fmt, sync::Arc, time::Instant};

use chrono::NaiveDate;
use domain::{NormalizedParams, PharmacyId, ProductCode, QueryParams};
use tracing::{debug, info, instrument};

pub use self::warming::{WarmReport, WarmTarget, warm_targets};
use super::{
    AggregationDispatcher, InvalidationCoordinator, InvalidationTrigger, ParameterNormalizer,
    TtlPolicy,
};
use crate::{
    cache_key::{CacheKey, CaKeyBuilder, KeyBuilder},
    envelope::CaEnvelope,
    error::ApplicationError,
    ports::{CachePort, CachePortExt, CacheStats, SalesAggregationPort},
};

/// Facade over the revenue analytics pipeline
pub struct CaKpiService {
    cache: Arc<dyn CachePort>,
    dispatcher: Arc<AggregationDispatcher>,
    keys: Arc<dyn KeyBuilder>,
    normalizer: ParameterNormalizer,
    ttl: TtlPolicy,
    invalidation: InvalidationCoordinator,
}

impl fmt::Debug for CaKpiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaKpiService")
            .field("cache", &self.cache)
            .field("dispatcher", &self.dispatcher)
            .field("keys", &self.keys)
            .field("normalizer", &self.normalizer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CaKpiService {
    /// Create a service with default key layout, TTLs and limits
    pub fn new(cache: Arc<dyn CachePort>, store: Arc<dyn SalesAggregationPort>) -> Self {
        Self {
            invalidation: InvalidationCoordinator::new(Arc::clone(&cache)),
            cache,
            dispatcher: Arc::new(AggregationDispatcher::new(store)),
            keys: Arc::new(CaKeyBuilder::default()),
            normalizer: ParameterNormalizer::default(),
            ttl: TtlPolicy::default(),
        }
    }

    /// Replace the key derivation function
    #[must_use]
    pub fn with_key_builder(mut self, keys: Arc<dyn KeyBuilder>) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub const fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_normalizer(mut self, normalizer: ParameterNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: AggregationDispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Compute (or fetch from cache) the report for a request
    pub async fn calculate(&self, params: QueryParams) -> Result<CaEnvelope, ApplicationError> {
        let started = Instant::now();
        let params = self.normalizer.normalize(params)?;
        self.respond(params, started).await
    }

    /// Like [`Self::calculate`] with an explicit date for the default window
    pub async fn calculate_at(
        &self,
        params: QueryParams,
        today: NaiveDate,
    ) -> Result<CaEnvelope, ApplicationError> {
        let started = Instant::now();
        let params = self.normalizer.normalize_at(params, today)?;
        self.respond(params, started).await
    }

    #[instrument(skip(self, params, started), fields(detail = %params.detail()))]
    async fn respond(
        &self,
        params: NormalizedParams,
        started: Instant,
    ) -> Result<CaEnvelope, ApplicationError> {
        let key = self.keys.build_key(&params)?;

        let cached: Option<CaEnvelope> = self.cache.get(key.as_str()).await;
        if let Some(cached) = cached {
            debug!(key = %key, "Serving cached report");
            return Ok(cached.served_from_cache(started.elapsed()));
        }

        info!(key = %key, "Cache miss, computing report");
        self.compute_and_store(params, key, started).await
    }

    /// Compute a report and write it to the cache
    ///
    /// Runs on its own task so that a caller dropping the request does not
    /// abort the cache write.
    async fn compute_and_store(
        &self,
        params: NormalizedParams,
        key: CacheKey,
        started: Instant,
    ) -> Result<CaEnvelope, ApplicationError> {
        let cache = Arc::clone(&self.cache);
        let dispatcher = Arc::clone(&self.dispatcher);
        let ttl = self.ttl.ttl_for(params.detail());

        let task = tokio::spawn(async move {
            let report = dispatcher.dispatch(&params).await?;
            let envelope = CaEnvelope::computed(report, key, ttl, started.elapsed());
            cache
                .set(envelope.meta.cache.key.as_str(), &envelope, ttl)
                .await?;
            info!(
                key = %envelope.meta.cache.key,
                ttl_secs = ttl.as_secs(),
                query_time_ms = envelope.meta.performance.query_time,
                "Report computed and cached"
            );
            Ok::<_, ApplicationError>(envelope)
        });

        task.await
            .map_err(|e| ApplicationError::Internal(format!("Aggregation task failed: {e}")))?
    }

    /// Purge reports affected by an arbitrary trigger
    pub async fn invalidate(&self, trigger: &InvalidationTrigger) -> u64 {
        self.invalidation.invalidate(trigger).await
    }

    /// Purge reports affected by a change to one pharmacy
    pub async fn invalidate_pharmacy(&self, pharmacy_id: &str) -> Result<u64, ApplicationError> {
        let id = PharmacyId::parse(pharmacy_id)?;
        Ok(self.invalidate(&InvalidationTrigger::Pharmacy(id)).await)
    }

    /// Purge reports affected by a change to one product
    pub async fn invalidate_product(&self, code: &str) -> Result<u64, ApplicationError> {
        let code = ProductCode::new(code)?;
        Ok(self.invalidate(&InvalidationTrigger::Product(code)).await)
    }

    /// Purge reports whose window overlaps `[start, end]`
    pub async fn invalidate_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, ApplicationError> {
        if end < start {
            return Err(domain::DomainError::validation(
                "endDate",
                format!("end date {end} is before start date {start}"),
            )
            .into());
        }
        Ok(self
            .invalidate(&InvalidationTrigger::Period { start, end })
            .await)
    }

    /// Purge every cached report
    pub async fn invalidate_all(&self) -> u64 {
        self.invalidate(&InvalidationTrigger::All).await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use domain::{CaReport, DetailLevel, ProductTotals, SalesTotals};

    use super::*;
    use crate::ports::{AggregationPayload, MockSalesAggregationPort, StorageError, fake::FakeCache};

    const PHARMACY: &str = "0b7c1f3e-8f4d-4a43-9a57-2f6f3c1d9e10";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn totals() -> SalesTotals {
        SalesTotals {
            revenue: 98_765.432,
            pharmacy_count: 12,
            product_count: 340,
            transaction_count: 4_321,
        }
    }

    fn summary_store(calls: usize) -> MockSalesAggregationPort {
        let mut store = MockSalesAggregationPort::new();
        store
            .expect_run_aggregation()
            .times(calls)
            .returning(|_, _| Ok(AggregationPayload::Summary(totals())));
        store
    }

    fn service(cache: &Arc<FakeCache>, store: MockSalesAggregationPort) -> CaKpiService {
        CaKpiService::new(cache.clone(), Arc::new(store))
    }

    #[tokio::test]
    async fn first_request_is_computed_and_cached() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(1));

        let envelope = service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();

        assert!(!envelope.from_cache());
        let key = envelope.meta.cache.key.as_str();
        assert!(key.starts_with("ca:summary:2023-06-17:2024-06-15:"));
        assert_eq!(cache.ttl_of(key), Some(Duration::from_secs(3600)));
        assert_eq!(envelope.meta.cache.ttl, 3600);
    }

    #[tokio::test]
    async fn repeated_request_is_served_from_cache() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(1));

        let first = service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();
        let second = service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();

        assert!(second.from_cache());
        assert_eq!(second.data, first.data);
        assert_eq!(second.meta.cache.key, first.meta.cache.key);
    }

    #[tokio::test]
    async fn pharmacy_invalidation_drops_global_reports() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(2));

        service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();
        let removed = service.invalidate_pharmacy(PHARMACY).await.unwrap();
        assert_eq!(removed, 1);

        let again = service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();
        assert!(!again.from_cache());
    }

    #[tokio::test]
    async fn product_pages_do_not_overlap() {
        let codes: Vec<ProductCode> = (1..=45u32)
            .map(|i| ProductCode::new(format!("340093{i:07}")).unwrap())
            .collect();

        let mut store = MockSalesAggregationPort::new();
        store
            .expect_run_aggregation()
            .withf(|_, level| *level == DetailLevel::Product)
            .times(2)
            .returning(move |params, _| {
                let rows = codes
                    .iter()
                    .filter(|c| params.cursor().is_none_or(|cursor| *c > cursor))
                    .take(params.limit() as usize + 1)
                    .map(|code| ProductTotals {
                        code: code.clone(),
                        name: None,
                        category: None,
                        revenue: 5.0,
                        quantity: 1,
                        average_price: 5.0,
                    })
                    .collect();
                Ok(AggregationPayload::Products(rows))
            });

        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, store);
        let request = QueryParams::new()
            .with_detail(DetailLevel::Product)
            .with_limit(20);

        let first = service
            .calculate_at(request.clone(), today())
            .await
            .unwrap();
        let CaReport::Product(page1) = first.data else {
            unreachable!("expected product page");
        };
        assert_eq!(page1.by_product.len(), 20);
        assert!(page1.pagination.has_more);
        let cursor = page1.pagination.cursor.clone().unwrap();
        assert_eq!(cursor, page1.by_product[19].ean13);

        let second = service
            .calculate_at(request.with_cursor(cursor.as_str()), today())
            .await
            .unwrap();
        let CaReport::Product(page2) = second.data else {
            unreachable!("expected product page");
        };
        assert_eq!(page2.by_product.len(), 20);
        assert!(
            page2
                .by_product
                .iter()
                .all(|row| !page1.by_product.iter().any(|p| p.ean13 == row.ean13))
        );
        assert!(page2.by_product[0].ean13 > cursor);
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced_and_not_cached() {
        let mut store = MockSalesAggregationPort::new();
        store
            .expect_run_aggregation()
            .returning(|_, _| Err(StorageError::Connection("refused".into())));

        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, store);

        let err = service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Storage(_)));
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_storage() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(0));

        let err = service
            .calculate_at(QueryParams::new().with_limit(500), today())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("limit"));
    }

    #[tokio::test]
    async fn malformed_pharmacy_id_is_rejected_for_invalidation() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(0));
        assert!(service.invalidate_pharmacy("nope").await.is_err());
        assert!(service.invalidate_product("123").await.is_err());
    }

    #[tokio::test]
    async fn period_invalidation_requires_ordered_dates() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(1));
        service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();

        let yesterday = today() - chrono::Duration::days(1);
        assert!(service.invalidate_period(today(), yesterday).await.is_err());
        assert_eq!(service.invalidate_period(today(), today()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalidate_all_then_stats_reports_empty_cache() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(1));
        service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();
        assert_eq!(service.stats().await.memory_entries, 1);

        assert_eq!(service.invalidate_all().await, 1);
        assert_eq!(service.stats().await.memory_entries, 0);
    }

    #[tokio::test]
    async fn custom_ttl_policy_is_applied() {
        let cache = Arc::new(FakeCache::default());
        let service = service(&cache, summary_store(1)).with_ttl_policy(TtlPolicy {
            summary_secs: 42,
            ..TtlPolicy::default()
        });

        let envelope = service
            .calculate_at(QueryParams::new(), today())
            .await
            .unwrap();
        assert_eq!(
            cache.ttl_of(envelope.meta.cache.key.as_str()),
            Some(Duration::from_secs(42))
        );
    }
}
