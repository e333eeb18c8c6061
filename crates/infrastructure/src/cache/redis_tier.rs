//! Redis remote tier
//!
//! Shares cached reports across processes. Key listing walks `SCAN MATCH`
//! so large keyspaces are never loaded with `KEYS`.

use std::time::Duration;

use application::ports::CacheError;
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{info, instrument};

use super::{RemoteEntry, RemoteTier};

/// Keys requested per `SCAN` round trip
const SCAN_BATCH: usize = 100;

/// Redis-backed remote tier
#[derive(Clone)]
pub struct RedisTier {
    conn: ConnectionManager,
    url: String,
}

impl std::fmt::Debug for RedisTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTier")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

fn map_redis(e: &redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Backend(e.to_string())
    }
}

impl RedisTier {
    /// Connect to `url` and verify the server answers `PING`
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| map_redis(&e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis(&e))?;

        let tier = Self {
            conn,
            url: url.to_string(),
        };
        tier.ping().await?;
        info!(url = %url, "Redis cache tier connected");
        Ok(tier)
    }
}

#[async_trait]
impl RemoteTier for RedisTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>, CacheError> {
        let mut conn = self.conn.clone();
        let (data, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .cmd("GET")
            .arg(key)
            .cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis(&e))?;

        // PTTL is -1 for keys without expiry and -2 for missing keys
        let remaining = u64::try_from(pttl).ok().map(Duration::from_millis);
        Ok(data.map(|data| RemoteEntry { data, remaining }))
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| map_redis(&e))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| map_redis(&e))
    }

    #[instrument(skip(self), level = "debug")]
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis(&e))?;

            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(|e| map_redis(&e))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis(&e))?;
        Ok(())
    }
}
