//! Bounded in-process cache tier
//!
//! Entries carry their own expiry and are dropped lazily on read. When an
//! insert of a new key would exceed the capacity, a quarter of the capacity
//! (at least one entry) is evicted, soonest-expiring first.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory cache tier with per-entry expiry
pub struct MemoryTier {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    max_entries: usize,
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("entries", &self.entries.read().len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryTier {
    /// Create a tier holding at most `max_entries` entries (minimum 1)
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Live value for `key`; an expired entry is removed and reported missing
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.data.clone()),
                Some(_) => {},
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        // Re-check under the write lock; a concurrent insert may have refreshed it
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
            debug!(key = %key, layer = "memory", "Expired entry dropped");
        }
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Store a value; a zero `ttl` stores nothing
    pub fn insert(&self, key: &str, data: Vec<u8>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let entry = MemoryEntry {
            data,
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write();
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            let evicted = self.evict(&mut entries);
            debug!(evicted, layer = "memory", "Evicted soonest-expiring entries");
        }
        entries.insert(key.to_string(), entry);
    }

    fn evict(&self, entries: &mut HashMap<String, MemoryEntry>) -> usize {
        let batch = (self.max_entries / 4).max(1);
        let mut by_expiry: Vec<(Instant, String)> = entries
            .iter()
            .map(|(key, entry)| (entry.expires_at, key.clone()))
            .collect();
        by_expiry.sort_unstable();

        by_expiry
            .into_iter()
            .take(batch)
            .filter(|(_, key)| entries.remove(key).is_some())
            .count()
    }

    /// Keys matching `pattern`, live or not
    pub fn keys_matching(&self, pattern: &Regex) -> Vec<String> {
        self.entries
            .read()
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect()
    }

    /// Remove the given keys; returns those that were present
    pub fn remove_keys(&self, keys: &[String]) -> Vec<String> {
        let mut entries = self.entries.write();
        keys.iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Rough payload footprint: key plus value bytes
    pub fn approx_bytes(&self) -> u64 {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| (key.len() + entry.data.len()) as u64)
            .sum()
    }
}
