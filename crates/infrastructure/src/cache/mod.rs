//! Cache implementations
//!
//! - `MemoryTier`: bounded in-process map with per-entry expiry
//! - `RedbTier`: embedded persistent remote tier
//! - `RedisTier`: shared Redis remote tier
//! - `TieredCache`: the [`CachePort`](application::ports::CachePort) adapter
//!   combining the memory tier with one optional remote tier

mod memory_tier;
mod redb_tier;
mod redis_tier;
mod tiered_cache;

use std::time::Duration;

use application::ports::CacheError;
use async_trait::async_trait;
use regex::Regex;

pub use memory_tier::MemoryTier;
pub use redb_tier::RedbTier;
pub use redis_tier::RedisTier;
pub use tiered_cache::{
    DEFAULT_FAST_TTL_CAP, DEFAULT_NAMESPACE, DEFAULT_REMOTE_TIMEOUT, TieredCache,
};

/// Value read from a remote tier together with its remaining lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub data: Vec<u8>,
    /// `None` when the backend reports no expiry for the key
    pub remaining: Option<Duration>,
}

/// Shared cache backend behind the memory tier
///
/// Keys are full (namespaced) keys. Implementations report failures; the
/// tiered cache decides what to absorb.
#[async_trait]
pub trait RemoteTier: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Live keys matching a glob where `*` matches any run of characters
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete the given keys; returns how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Cheap connectivity probe
    async fn ping(&self) -> Result<(), CacheError>;

    /// Drop entries whose TTL has passed; returns how many were removed
    ///
    /// Backends that expire keys on their own keep the default.
    async fn purge_expired(&self) -> Result<u64, CacheError> {
        Ok(0)
    }
}

/// Translate a key glob into an anchored regex
///
/// `*` becomes `.*`; every other character matches itself literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, CacheError> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
        .map_err(|e| CacheError::Backend(format!("Invalid key pattern {pattern:?}: {e}")))
}
