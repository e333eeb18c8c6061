//! Two-tier cache adapter
//!
//! Reads check the memory tier first, then the remote tier, promoting remote
//! hits into memory. Writes go to the remote tier first, then to memory with
//! a capped lifetime. Remote failures and timeouts are logged and absorbed:
//! a read degrades to a miss and a write to a memory-only write.

use std::{
    collections::HashSet,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use application::ports::{CacheError, CachePort, CacheStats, KeyPredicate};
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{
    MemoryTier, RedbTier, RedisTier, RemoteTier, glob_to_regex, memory_tier::DEFAULT_MAX_ENTRIES,
};
use crate::config::{CacheConfig, RemoteBackend};

pub const DEFAULT_NAMESPACE: &str = "pharmacy-analytics";
pub const DEFAULT_FAST_TTL_CAP: Duration = Duration::from_secs(300);
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_millis(500);

/// Bound on establishing the remote connection at startup
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Memory tier in front of an optional shared remote tier
pub struct TieredCache {
    namespace: String,
    memory: MemoryTier,
    remote: Option<Arc<dyn RemoteTier>>,
    fast_ttl_cap: Duration,
    remote_timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("namespace", &self.namespace)
            .field("memory", &self.memory)
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("fast_ttl_cap", &self.fast_ttl_cap)
            .field("remote_timeout", &self.remote_timeout)
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Create a cache with default limits; `None` runs memory-only
    pub fn new(remote: Option<Arc<dyn RemoteTier>>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            memory: MemoryTier::new(DEFAULT_MAX_ENTRIES),
            remote,
            fast_ttl_cap: DEFAULT_FAST_TTL_CAP,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_max_memory_entries(mut self, max_entries: usize) -> Self {
        self.memory = MemoryTier::new(max_entries);
        self
    }

    #[must_use]
    pub const fn with_fast_ttl_cap(mut self, cap: Duration) -> Self {
        self.fast_ttl_cap = cap;
        self
    }

    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Build from configuration, opening the configured remote tier
    ///
    /// A remote tier that cannot be opened is logged and the cache runs
    /// memory-only.
    pub async fn connect(config: &CacheConfig) -> Self {
        let remote = open_remote(config).await;
        Self::new(remote)
            .with_namespace(config.namespace.clone())
            .with_max_memory_entries(config.max_memory_entries)
            .with_fast_ttl_cap(config.fast_ttl_cap())
            .with_remote_timeout(config.remote_timeout())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    fn relative_key<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Run a remote operation under the timeout; failures are logged and
    /// reported as `None`
    async fn remote_call<T, F>(&self, op: &'static str, key: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, CacheError>> + Send,
    {
        let error = match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout(self.remote_timeout),
        };
        warn!(
            op,
            key = %key,
            layer = "remote",
            error = %error,
            "Remote cache operation failed, continuing without it"
        );
        None
    }
}

async fn open_remote(config: &CacheConfig) -> Option<Arc<dyn RemoteTier>> {
    let opened: Result<Arc<dyn RemoteTier>, CacheError> = match config.backend {
        RemoteBackend::None => return None,
        RemoteBackend::Redb => RedbTier::open(&config.redb_path).map(|t| Arc::new(t) as Arc<dyn RemoteTier>),
        RemoteBackend::Redis => {
            match tokio::time::timeout(CONNECT_TIMEOUT, RedisTier::connect(&config.redis_url)).await
            {
                Ok(connected) => connected.map(|t| Arc::new(t) as Arc<dyn RemoteTier>),
                Err(_) => Err(CacheError::Timeout(CONNECT_TIMEOUT)),
            }
        },
    };

    match opened {
        Ok(remote) => {
            info!(backend = %config.backend, "Remote cache tier ready");
            Some(remote)
        },
        Err(e) => {
            warn!(
                backend = %config.backend,
                error = %e,
                "Remote cache tier unavailable, running memory-only"
            );
            None
        },
    }
}

#[async_trait]
impl CachePort for TieredCache {
    #[instrument(skip(self), level = "debug")]
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let full = self.full_key(key);

        if let Some(data) = self.memory.get(&full) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, layer = "memory", "Cache hit");
            return Some(data);
        }

        if let Some(remote) = &self.remote {
            if let Some(Some(entry)) = self.remote_call("get", key, remote.get(&full)).await {
                let fast_ttl = entry
                    .remaining
                    .map_or(self.fast_ttl_cap, |r| r.min(self.fast_ttl_cap));
                self.memory.insert(&full, entry.data.clone(), fast_ttl);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, layer = "remote", "Cache hit, promoted to memory");
                return Some(entry.data);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Cache miss");
        None
    }

    #[instrument(skip(self, value), fields(bytes = value.len()), level = "debug")]
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let full = self.full_key(key);

        if let Some(remote) = &self.remote {
            self.remote_call("set", key, remote.set(&full, &value, ttl))
                .await;
        }
        self.memory.insert(&full, value, ttl.min(self.fast_ttl_cap));
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache set");
    }

    async fn exists(&self, key: &str) -> bool {
        let full = self.full_key(key);
        if self.memory.contains(&full) {
            return true;
        }
        match &self.remote {
            Some(remote) => self
                .remote_call("exists", key, remote.exists(&full))
                .await
                .unwrap_or(false),
            None => false,
        }
    }

    async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        self.invalidate_where(pattern, &|_| true).await
    }

    #[instrument(skip(self, predicate), level = "debug")]
    async fn invalidate_where(&self, pattern: &str, predicate: KeyPredicate<'_>) -> u64 {
        let full_pattern = self.full_key(pattern);
        let accept = |full: &String| self.relative_key(full).is_some_and(predicate);
        let mut removed: HashSet<String> = HashSet::new();

        if let Some(remote) = &self.remote {
            self.remote_call("purge", pattern, remote.purge_expired()).await;
            if let Some(listed) = self
                .remote_call("keys", pattern, remote.keys(&full_pattern))
                .await
            {
                let doomed: Vec<String> = listed.into_iter().filter(|k| accept(k)).collect();
                if !doomed.is_empty()
                    && self
                        .remote_call("delete", pattern, remote.delete(&doomed))
                        .await
                        .is_some()
                {
                    removed.extend(doomed);
                }
            }
        }

        match glob_to_regex(&full_pattern) {
            Ok(matcher) => {
                let doomed: Vec<String> = self
                    .memory
                    .keys_matching(&matcher)
                    .into_iter()
                    .filter(|k| accept(k))
                    .collect();
                removed.extend(self.memory.remove_keys(&doomed));
            },
            Err(e) => warn!(pattern = %pattern, error = %e, layer = "memory", "Skipping invalidation"),
        }

        let count = removed.len() as u64;
        if count > 0 {
            debug!(pattern = %pattern, removed = count, "Cache entries invalidated");
        }
        count
    }

    async fn clear(&self) -> u64 {
        self.invalidate_pattern("*").await
    }

    async fn stats(&self) -> CacheStats {
        let (remote_connected, remote_entries) = match &self.remote {
            Some(remote) => {
                let connected = self
                    .remote_call("ping", "-", remote.ping())
                    .await
                    .is_some();
                let entries = if connected {
                    self.remote_call("purge", "*", remote.purge_expired()).await;
                    let all = self.full_key("*");
                    self.remote_call("keys", "*", remote.keys(&all))
                        .await
                        .map(|keys| keys.len() as u64)
                } else {
                    None
                };
                (connected, entries)
            },
            None => (false, None),
        };

        CacheStats {
            remote_connected,
            remote_entries,
            memory_entries: self.memory.len() as u64,
            memory_bytes: self.memory.approx_bytes(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use application::ports::CachePortExt;

    use super::*;
    use crate::cache::{RedbTier, RemoteEntry};

    const TTL: Duration = Duration::from_secs(3600);

    fn redb_backed() -> (TieredCache, Arc<RedbTier>) {
        let remote = Arc::new(RedbTier::in_memory().unwrap());
        let cache = TieredCache::new(Some(remote.clone() as Arc<dyn RemoteTier>));
        (cache, remote)
    }

    /// Remote tier that fails every call
    #[derive(Debug, Default)]
    struct BrokenRemote {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteTier for BrokenRemote {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn get(&self, _: &str) -> Result<Option<RemoteEntry>, CacheError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(CacheError::Connection("refused".into()))
        }
        async fn set(&self, _: &str, _: &[u8], _: Duration) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(CacheError::Connection("refused".into()))
        }
        async fn exists(&self, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn keys(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn delete(&self, _: &[String]) -> Result<u64, CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
    }

    /// Remote tier that never answers in time
    #[derive(Debug)]
    struct StalledRemote;

    #[async_trait]
    impl RemoteTier for StalledRemote {
        fn name(&self) -> &'static str {
            "stalled"
        }
        async fn get(&self, _: &str) -> Result<Option<RemoteEntry>, CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
        async fn set(&self, _: &str, _: &[u8], _: Duration) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool, CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(false)
        }
        async fn keys(&self, _: &str) -> Result<Vec<String>, CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn delete(&self, _: &[String]) -> Result<u64, CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(0)
        }
        async fn ping(&self) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (cache, _) = redb_backed();
        cache.set_bytes("ca:summary:x", b"report".to_vec(), TTL).await;
        assert_eq!(cache.get_bytes("ca:summary:x").await, Some(b"report".to_vec()));
        assert!(cache.exists("ca:summary:x").await);
    }

    #[tokio::test]
    async fn keys_are_namespaced_in_the_remote_tier() {
        let (cache, remote) = redb_backed();
        cache.set_bytes("ca:summary:x", b"1".to_vec(), TTL).await;

        assert!(remote.exists("pharmacy-analytics:ca:summary:x").await.unwrap());
        assert!(!remote.exists("ca:summary:x").await.unwrap());
    }

    #[tokio::test]
    async fn remote_hit_is_promoted_to_memory() {
        let (cache, remote) = redb_backed();
        remote
            .set("pharmacy-analytics:ca:summary:x", b"warm", TTL)
            .await
            .unwrap();

        assert_eq!(cache.memory.len(), 0);
        assert_eq!(cache.get_bytes("ca:summary:x").await, Some(b"warm".to_vec()));
        assert_eq!(cache.memory.len(), 1);

        // Served from memory even once the remote copy is gone
        remote
            .delete(&["pharmacy-analytics:ca:summary:x".to_string()])
            .await
            .unwrap();
        assert_eq!(cache.get_bytes("ca:summary:x").await, Some(b"warm".to_vec()));
    }

    #[tokio::test]
    async fn memory_copy_never_outlives_the_cap() {
        let (cache, _) = redb_backed();
        let cache = cache.with_fast_ttl_cap(Duration::from_millis(20));
        cache.set_bytes("ca:k", b"v".to_vec(), TTL).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!cache.memory.contains("pharmacy-analytics:ca:k"));
        // Still served by the remote tier
        assert_eq!(cache.get_bytes("ca:k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn invalidate_pattern_clears_both_tiers() {
        let (cache, remote) = redb_backed();
        cache.set_bytes("ca:summary:a", b"1".to_vec(), TTL).await;
        cache.set_bytes("ca:product:b", b"2".to_vec(), TTL).await;
        cache.set_bytes("other:c", b"3".to_vec(), TTL).await;

        assert_eq!(cache.invalidate_pattern("ca:*").await, 2);
        assert_eq!(cache.get_bytes("ca:summary:a").await, None);
        assert!(remote.keys("pharmacy-analytics:ca:*").await.unwrap().is_empty());
        assert!(cache.exists("other:c").await);
    }

    #[tokio::test]
    async fn invalidate_without_matches_is_a_no_op() {
        let (cache, _) = redb_backed();
        cache.set_bytes("ca:summary:a", b"1".to_vec(), TTL).await;
        assert_eq!(cache.invalidate_pattern("ca:product:*").await, 0);
        assert!(cache.exists("ca:summary:a").await);
    }

    #[tokio::test]
    async fn predicate_sees_relative_keys() {
        let (cache, _) = redb_backed();
        cache.set_bytes("ca:summary:keep", b"1".to_vec(), TTL).await;
        cache.set_bytes("ca:summary:drop", b"2".to_vec(), TTL).await;

        let removed = cache
            .invalidate_where("ca:*", &|key: &str| key == "ca:summary:drop")
            .await;

        assert_eq!(removed, 1);
        assert!(cache.exists("ca:summary:keep").await);
        assert!(!cache.exists("ca:summary:drop").await);
    }

    #[tokio::test]
    async fn clear_only_touches_the_namespace() {
        let (cache, remote) = redb_backed();
        cache.set_bytes("ca:a", b"1".to_vec(), TTL).await;
        remote.set("elsewhere:b", b"2", TTL).await.unwrap();

        assert_eq!(cache.clear().await, 1);
        assert!(remote.exists("elsewhere:b").await.unwrap());
    }

    #[tokio::test]
    async fn clear_reclaims_expired_remote_rows() {
        let (cache, remote) = redb_backed();
        remote
            .set("pharmacy-analytics:ca:summary:old", b"1", Duration::from_millis(1))
            .await
            .unwrap();
        cache.set_bytes("ca:summary:live", b"2".to_vec(), TTL).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.clear().await, 1);
        assert_eq!(remote.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_reclaim_expired_remote_rows() {
        let (cache, remote) = redb_backed();
        remote
            .set("pharmacy-analytics:ca:summary:old", b"1", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.remote_entries, Some(0));
        assert_eq!(remote.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn broken_remote_degrades_to_memory() {
        let remote = Arc::new(BrokenRemote::default());
        let cache = TieredCache::new(Some(remote.clone() as Arc<dyn RemoteTier>));

        assert_eq!(cache.get_bytes("ca:k").await, None);
        cache.set_bytes("ca:k", b"v".to_vec(), TTL).await;
        assert_eq!(cache.get_bytes("ca:k").await, Some(b"v".to_vec()));
        assert_eq!(cache.invalidate_pattern("ca:*").await, 1);
        assert_eq!(remote.calls.load(Ordering::Relaxed), 2);

        let stats = cache.stats().await;
        assert!(!stats.remote_connected);
        assert_eq!(stats.remote_entries, None);
    }

    #[tokio::test]
    async fn stalled_remote_is_bounded_by_the_timeout() {
        let cache = TieredCache::new(Some(Arc::new(StalledRemote) as Arc<dyn RemoteTier>))
            .with_remote_timeout(Duration::from_millis(20));

        let started = std::time::Instant::now();
        assert_eq!(cache.get_bytes("ca:k").await, None);
        cache.set_bytes("ca:k", b"v".to_vec(), TTL).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(cache.get_bytes("ca:k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn connect_honours_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            backend: RemoteBackend::Redb,
            redb_path: dir.path().join("cache.redb").display().to_string(),
            namespace: "test-ns".into(),
            max_memory_entries: 3,
            ..CacheConfig::default()
        };

        let cache = TieredCache::connect(&config).await;
        assert_eq!(cache.namespace(), "test-ns");
        assert_eq!(cache.memory.max_entries(), 3);
        assert!(cache.stats().await.remote_connected);
    }

    #[tokio::test]
    async fn connect_without_backend_is_memory_only() {
        let config = CacheConfig {
            backend: RemoteBackend::None,
            ..CacheConfig::default()
        };
        let cache = TieredCache::connect(&config).await;
        assert!(cache.remote.is_none());
    }

    #[tokio::test]
    async fn memory_only_cache_works_without_remote() {
        let cache = TieredCache::new(None).with_max_memory_entries(4);
        cache.set_bytes("ca:k", b"v".to_vec(), TTL).await;
        assert_eq!(cache.get_bytes("ca:k").await, Some(b"v".to_vec()));

        let stats = cache.stats().await;
        assert!(!stats.remote_connected);
        assert_eq!(stats.memory_entries, 1);
    }

    #[tokio::test]
    async fn stats_count_hits_misses_and_remote_keys() {
        let (cache, _) = redb_backed();
        cache.set_bytes("ca:a", b"1".to_vec(), TTL).await;
        cache.set_bytes("ca:b", b"22".to_vec(), TTL).await;
        cache.get_bytes("ca:a").await;
        cache.get_bytes("ca:missing").await;

        let stats = cache.stats().await;
        assert!(stats.remote_connected);
        assert_eq!(stats.remote_entries, Some(2));
        assert_eq!(stats.memory_entries, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.memory_bytes > 0);
    }

    #[tokio::test]
    async fn typed_helpers_round_trip_json() {
        let (cache, _) = redb_backed();
        cache.set("ca:typed", &vec![1_u32, 2, 3], TTL).await.unwrap();
        let value: Option<Vec<u32>> = cache.get("ca:typed").await;
        assert_eq!(value, Some(vec![1, 2, 3]));

        cache.set_bytes("ca:garbage", b"not json".to_vec(), TTL).await;
        let value: Option<Vec<u32>> = cache.get("ca:garbage").await;
        assert_eq!(value, None);
    }
}
