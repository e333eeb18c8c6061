//! Cache port definition
//!
//! Defines the tiered cache used to shield the sales store from repeated
//! aggregation queries. Keys passed through this port are relative; the
//! implementation owns the namespace prefix.
//!
//! Every operation is infallible from the caller's point of view. A cache
//! that cannot reach its backend degrades to misses and no-ops, so request
//! handling never fails because of the cache.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::error::ApplicationError;

/// Failures raised by cache backends
///
/// These never cross the [`CachePort`] boundary; the tiered store logs and
/// absorbs them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Predicate deciding whether a listed key should be removed
pub type KeyPredicate<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// Cache port for storing and retrieving cached values
///
/// Values are stored as raw bytes; callers handle serialization or use
/// [`CachePortExt`].
#[async_trait]
pub trait CachePort: Send + Sync + std::fmt::Debug {
    /// Get a cached value by key
    ///
    /// Returns `None` if the key doesn't exist, has expired, or the backend
    /// could not be reached.
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value with a time-to-live, replacing any previous value
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration);

    /// Check if a live entry exists for the key
    async fn exists(&self, key: &str) -> bool;

    /// Remove every entry whose key matches a glob (`*` matches any run of
    /// characters); returns the number of keys removed
    async fn invalidate_pattern(&self, pattern: &str) -> u64;

    /// Remove every entry whose key matches `pattern` and satisfies `predicate`
    async fn invalidate_where(&self, pattern: &str, predicate: KeyPredicate<'_>) -> u64;

    /// Remove every entry under the namespace
    async fn clear(&self) -> u64;

    /// Current cache statistics; never fails
    async fn stats(&self) -> CacheStats;
}

/// Extension trait for typed cache operations
///
/// Provides convenient typed get/set methods on top of the raw byte interface.
#[async_trait]
pub trait CachePortExt: CachePort {
    /// Get a typed value from cache; undecodable entries count as misses
    async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let bytes = self.get_bytes(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            },
        }
    }

    /// Set a typed value in cache
    async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), ApplicationError>
    where
        T: serde::Serialize + Send + Sync,
    {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ApplicationError::Internal(format!("Cache serialization error: {e}")))?;
        self.set_bytes(key, bytes, ttl).await;
        Ok(())
    }
}

// Blanket implementation for all CachePort implementors
impl<T: CachePort + ?Sized> CachePortExt for T {}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Whether the remote tier answered its last health probe
    pub remote_connected: bool,
    /// Keys held by the remote tier under the namespace, when reachable
    pub remote_entries: Option<u64>,
    /// Entries currently held by the fast tier
    pub memory_entries: u64,
    /// Approximate fast tier payload size in bytes
    pub memory_bytes: u64,
    /// Number of lookups answered from either tier
    pub hits: u64,
    /// Number of lookups answered by neither tier
    pub misses: u64,
}

impl CacheStats {
    /// Calculate the hit rate as a fraction (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
