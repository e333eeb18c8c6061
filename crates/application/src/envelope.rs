//! Response envelope wrapping every revenue report

use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::{CaReport, QueryComplexity};
use serde::{Deserialize, Serialize};

use crate::cache_key::CacheKey;

/// Where the payload of an envelope came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    RealTime,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMeta {
    /// Wall-clock time of this call in milliseconds
    pub query_time: u64,
    pub from_cache: bool,
    pub query_complexity: QueryComplexity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Lifetime the entry was stored with, in seconds
    pub ttl: u64,
    pub key: CacheKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub calculated_at: DateTime<Utc>,
    pub data_source: DataSource,
    pub performance: PerformanceMeta,
    pub cache: CacheMeta,
}

/// A report plus the metadata describing how it was produced
///
/// The same shape is what gets stored in the cache; on a hit the metadata is
/// rewritten for the current call while the report stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaEnvelope {
    pub data: CaReport,
    pub meta: ResponseMeta,
}

impl CaEnvelope {
    /// Wrap a freshly computed report
    #[must_use]
    pub fn computed(data: CaReport, key: CacheKey, ttl: Duration, elapsed: Duration) -> Self {
        let complexity = data.detail().complexity();
        Self {
            data,
            meta: ResponseMeta {
                calculated_at: Utc::now(),
                data_source: DataSource::RealTime,
                performance: PerformanceMeta {
                    query_time: millis(elapsed),
                    from_cache: false,
                    query_complexity: complexity,
                },
                cache: CacheMeta {
                    ttl: ttl.as_secs(),
                    key,
                },
            },
        }
    }

    /// Mark a stored envelope as served from cache for this call
    #[must_use]
    pub fn served_from_cache(mut self, elapsed: Duration) -> Self {
        self.meta.data_source = DataSource::Cached;
        self.meta.performance.from_cache = true;
        self.meta.performance.query_time = millis(elapsed);
        self
    }

    pub const fn from_cache(&self) -> bool {
        self.meta.performance.from_cache
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
