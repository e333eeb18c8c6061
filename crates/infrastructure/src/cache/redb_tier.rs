//! Redb embedded remote tier
//!
//! Persistent key-value store used as the shared tier when no Redis server
//! is available. Expiry is stored next to each value and enforced on read;
//! expired entries are removed lazily or by [`RedbTier::cleanup_expired`].

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use application::ports::CacheError;
use async_trait::async_trait;
use bincode::{Decode, Encode};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, instrument, warn};

use super::{RemoteEntry, RemoteTier, glob_to_regex};

const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("ca_cache");

/// Stored value with its absolute expiry
#[derive(Debug, Encode, Decode)]
struct StoredEntry {
    data: Vec<u8>,
    /// Unix epoch milliseconds
    expires_at_ms: u64,
}

impl StoredEntry {
    fn remaining(&self, now_ms: u64) -> Option<Duration> {
        self.expires_at_ms
            .checked_sub(now_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Redb-backed remote tier
pub struct RedbTier {
    db: Arc<Database>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for RedbTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbTier")
            .field("db", &"<Database>")
            .field("path", &self.path)
            .finish()
    }
}

fn backend(context: &str, e: impl std::fmt::Display) -> CacheError {
    CacheError::Backend(format!("{context}: {e}"))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn decode(bytes: &[u8]) -> Result<StoredEntry, CacheError> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(entry, _)| entry)
        .map_err(|e| CacheError::Serialization(e.to_string()))
}

impl RedbTier {
    /// Open or create the database file at `path`
    ///
    /// A corrupted or incompatible file is deleted and recreated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path_buf = path.as_ref().to_path_buf();

        let db = match Database::create(&path_buf) {
            Ok(db) => db,
            Err(e) => {
                warn!(
                    path = %path_buf.display(),
                    error = %e,
                    "Cache database corrupted or incompatible, recreating"
                );
                if path_buf.exists() {
                    fs::remove_file(&path_buf)
                        .map_err(|e| backend("Failed to remove corrupted database", e))?;
                }
                Database::create(&path_buf).map_err(|e| backend("Failed to create database", e))?
            },
        };

        Self::with_database(db, Some(path_buf))
    }

    /// Volatile tier backed by memory only
    pub fn in_memory() -> Result<Self, CacheError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| backend("Failed to create in-memory database", e))?;
        Self::with_database(db, None)
    }

    fn with_database(db: Database, path: Option<PathBuf>) -> Result<Self, CacheError> {
        let write_txn = db
            .begin_write()
            .map_err(|e| backend("Failed to begin write transaction", e))?;
        {
            // Opening the table creates it
            let _ = write_txn
                .open_table(CACHE_TABLE)
                .map_err(|e| backend("Failed to open cache table", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| backend("Failed to commit transaction", e))?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Run blocking redb work off the async runtime
    async fn blocking<T, F>(&self, work: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, CacheError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(|e| backend("Task join error", e))?
    }

    /// Remove every expired entry; returns how many were removed
    ///
    /// Reads skip expired rows without deleting them, so the tiered cache
    /// runs this before listing keys.
    pub async fn cleanup_expired(&self) -> Result<u64, CacheError> {
        let removed = self
            .blocking(|db| {
                let now = now_ms();
                let write_txn = db
                    .begin_write()
                    .map_err(|e| backend("Failed to begin write transaction", e))?;
                let removed = {
                    let mut table = write_txn
                        .open_table(CACHE_TABLE)
                        .map_err(|e| backend("Failed to open cache table", e))?;
                    let before = table.len().map_err(|e| backend("Redb len error", e))?;
                    table
                        .retain(|_, value| decode(value).is_ok_and(|e| e.remaining(now).is_some()))
                        .map_err(|e| backend("Redb retain error", e))?;
                    before - table.len().map_err(|e| backend("Redb len error", e))?
                };
                write_txn
                    .commit()
                    .map_err(|e| backend("Failed to commit cleanup", e))?;
                Ok(removed)
            })
            .await?;

        if removed > 0 {
            debug!(removed, "Cleaned up expired cache entries");
        }
        Ok(removed)
    }
}

fn read_entry(db: &Database, key: &str) -> Result<Option<StoredEntry>, CacheError> {
    let read_txn = db
        .begin_read()
        .map_err(|e| backend("Failed to begin read transaction", e))?;
    let table = read_txn
        .open_table(CACHE_TABLE)
        .map_err(|e| backend("Failed to open cache table", e))?;
    let value = table.get(key).map_err(|e| backend("Redb get error", e))?;
    value.map(|v| decode(v.value())).transpose()
}

fn remove_keys(db: &Database, keys: &[String]) -> Result<u64, CacheError> {
    let write_txn = db
        .begin_write()
        .map_err(|e| backend("Failed to begin write transaction", e))?;
    let mut removed = 0;
    {
        let mut table = write_txn
            .open_table(CACHE_TABLE)
            .map_err(|e| backend("Failed to open cache table", e))?;
        for key in keys {
            if table
                .remove(key.as_str())
                .map_err(|e| backend("Redb remove error", e))?
                .is_some()
            {
                removed += 1;
            }
        }
    }
    write_txn
        .commit()
        .map_err(|e| backend("Failed to commit transaction", e))?;
    Ok(removed)
}

#[async_trait]
impl RemoteTier for RedbTier {
    fn name(&self) -> &'static str {
        "redb"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>, CacheError> {
        let owned = key.to_string();
        let entry = self.blocking(move |db| read_entry(db, &owned)).await?;

        let Some(entry) = entry else {
            return Ok(None);
        };
        match entry.remaining(now_ms()) {
            Some(remaining) => Ok(Some(RemoteEntry {
                data: entry.data,
                remaining: Some(remaining),
            })),
            None => {
                let expired = vec![key.to_string()];
                self.blocking(move |db| remove_keys(db, &expired)).await?;
                debug!(key = %key, layer = "redb", "Cache entry expired");
                Ok(None)
            },
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let entry = StoredEntry {
            data: value.to_vec(),
            expires_at_ms: now_ms().saturating_add(ttl_ms),
        };
        let bytes = bincode::encode_to_vec(&entry, bincode::config::standard())
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let owned = key.to_string();

        self.blocking(move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| backend("Failed to begin write transaction", e))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| backend("Failed to open cache table", e))?;
                table
                    .insert(owned.as_str(), bytes.as_slice())
                    .map_err(|e| backend("Redb insert error", e))?;
            }
            write_txn
                .commit()
                .map_err(|e| backend("Failed to commit transaction", e))
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let owned = key.to_string();
        let entry = self.blocking(move |db| read_entry(db, &owned)).await?;
        Ok(entry.is_some_and(|e| e.remaining(now_ms()).is_some()))
    }

    #[instrument(skip(self), level = "debug")]
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matcher = glob_to_regex(pattern)?;
        self.blocking(move |db| {
            let now = now_ms();
            let read_txn = db
                .begin_read()
                .map_err(|e| backend("Failed to begin read transaction", e))?;
            let table = read_txn
                .open_table(CACHE_TABLE)
                .map_err(|e| backend("Failed to open cache table", e))?;

            let mut keys = Vec::new();
            for row in table.iter().map_err(|e| backend("Redb iteration error", e))? {
                let (key, value) = row.map_err(|e| backend("Redb iteration error", e))?;
                let key = key.value();
                if matcher.is_match(key)
                    && decode(value.value()).is_ok_and(|e| e.remaining(now).is_some())
                {
                    keys.push(key.to_string());
                }
            }
            Ok(keys)
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let owned = keys.to_vec();
        self.blocking(move |db| remove_keys(db, &owned)).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.blocking(|db| {
            db.begin_read()
                .map(|_| ())
                .map_err(|e| backend("Failed to begin read transaction", e))
        })
        .await
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        self.cleanup_expired().await
    }
}
