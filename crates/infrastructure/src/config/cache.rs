//! Cache configuration: tier limits, remote backend and TTL policy.

use std::{fmt, time::Duration};

use application::TtlPolicy;
use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_FAST_TTL_CAP, DEFAULT_NAMESPACE, DEFAULT_REMOTE_TIMEOUT};

/// Which shared tier sits behind the in-memory tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// Redis server at `redis_url`
    #[default]
    Redis,
    /// Embedded redb file at `redb_path`
    Redb,
    /// Memory tier only
    None,
}

impl fmt::Display for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Redb => write!(f, "redb"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix prepended to every key, separated by `:`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Upper bound on how long the memory tier keeps a copy (default: 5 minutes)
    #[serde(default = "default_fast_ttl_cap_secs")]
    pub fast_ttl_cap_secs: u64,

    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Bound on every remote tier operation
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    #[serde(default)]
    pub backend: RemoteBackend,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_redb_path")]
    pub redb_path: String,

    /// Freshness per detail level
    #[serde(default)]
    pub ttl: TtlPolicy,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

const fn default_fast_ttl_cap_secs() -> u64 {
    DEFAULT_FAST_TTL_CAP.as_secs()
}

const fn default_max_memory_entries() -> usize {
    500
}

#[allow(clippy::cast_possible_truncation)]
const fn default_remote_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT.as_millis() as u64
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redb_path() -> String {
    "ca-analytics-cache.redb".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            fast_ttl_cap_secs: default_fast_ttl_cap_secs(),
            max_memory_entries: default_max_memory_entries(),
            remote_timeout_ms: default_remote_timeout_ms(),
            backend: RemoteBackend::default(),
            redis_url: default_redis_url(),
            redb_path: default_redb_path(),
            ttl: TtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn fast_ttl_cap(&self) -> Duration {
        Duration::from_secs(self.fast_ttl_cap_secs)
    }

    #[must_use]
    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}
