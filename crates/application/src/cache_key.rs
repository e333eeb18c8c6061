//! Cache key derivation for revenue queries
//!
//! Keys are colon separated, with segments in a fixed order:
//!
//! ```text
//! ca:<detail>:<start>:<end>:ph:<token>:ean:<token>:<limit>:<cursor>
//! ```
//!
//! A filter token is `all` when the filter is absent, `<n>=<a>,<b>,...` for a
//! short sorted list, and `#<hash>` for a list longer than the hashing
//! threshold. The hash is blake3 over the sorted list, truncated to 128 bits;
//! collisions at that width are accepted.

use std::fmt;

use chrono::NaiveDate;
use domain::NormalizedParams;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Leading segment of every revenue key
pub const KEY_PREFIX: &str = "ca";

/// Glob matching every revenue key
pub const ALL_KEYS_PATTERN: &str = "ca:*";

const SEPARATOR: char = ':';
const NO_CURSOR: &str = "no-cursor";
const ALL: &str = "all";
const HASH_HEX_LEN: usize = 32;

/// A derived cache key, relative to the cache namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives cache keys from canonical parameters
pub trait KeyBuilder: Send + Sync + fmt::Debug {
    /// Build the key for `params`; equal parameters always yield equal keys
    fn build_key(&self, params: &NormalizedParams) -> Result<CacheKey, ApplicationError>;
}

/// List lengths above which a filter is replaced by its hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashThresholds {
    #[serde(default = "default_pharmacy_threshold")]
    pub pharmacies: usize,
    #[serde(default = "default_product_threshold")]
    pub products: usize,
}

const fn default_pharmacy_threshold() -> usize {
    5
}

const fn default_product_threshold() -> usize {
    10
}

impl Default for HashThresholds {
    fn default() -> Self {
        Self {
            pharmacies: default_pharmacy_threshold(),
            products: default_product_threshold(),
        }
    }
}

/// Default key layout for revenue queries
#[derive(Debug, Clone, Copy, Default)]
pub struct CaKeyBuilder {
    thresholds: HashThresholds,
}

impl CaKeyBuilder {
    #[must_use]
    pub const fn new(thresholds: HashThresholds) -> Self {
        Self { thresholds }
    }
}

impl KeyBuilder for CaKeyBuilder {
    fn build_key(&self, params: &NormalizedParams) -> Result<CacheKey, ApplicationError> {
        if params.end_date() <= params.start_date() {
            return Err(ApplicationError::InvalidArgument(format!(
                "end date {} is not after start date {}",
                params.end_date(),
                params.start_date()
            )));
        }

        let pharmacies: Vec<String> = params.pharmacy_ids().iter().map(ToString::to_string).collect();
        let products: Vec<String> = params
            .product_codes()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        let cursor = params.cursor().map_or(NO_CURSOR, |c| c.as_str());
        check_segment(cursor)?;

        let key = [
            KEY_PREFIX.to_string(),
            params.detail().as_str().to_string(),
            params.start_date().to_string(),
            params.end_date().to_string(),
            "ph".to_string(),
            filter_token(&pharmacies, self.thresholds.pharmacies)?,
            "ean".to_string(),
            filter_token(&products, self.thresholds.products)?,
            params.limit().to_string(),
            cursor.to_string(),
        ]
        .join(":");

        Ok(CacheKey(key))
    }
}

fn check_segment(segment: &str) -> Result<(), ApplicationError> {
    if segment.is_empty() {
        return Err(ApplicationError::InvalidArgument(
            "empty key segment".to_string(),
        ));
    }
    if segment.contains(SEPARATOR) || segment.contains('*') {
        return Err(ApplicationError::InvalidArgument(format!(
            "key segment '{segment}' contains a reserved character"
        )));
    }
    Ok(())
}

/// Token for a sorted filter list
fn filter_token(sorted: &[String], threshold: usize) -> Result<String, ApplicationError> {
    if sorted.is_empty() {
        return Ok(ALL.to_string());
    }
    for item in sorted {
        check_segment(item)?;
    }

    if sorted.len() > threshold {
        let mut hasher = blake3::Hasher::new();
        for item in sorted {
            hasher.update(item.as_bytes());
            hasher.update(b",");
        }
        let hex = hasher.finalize().to_hex();
        Ok(format!("#{}", &hex[..HASH_HEX_LEN]))
    } else {
        Ok(format!("{}={}", sorted.len(), sorted.join(",")))
    }
}

/// Recover the inclusive date window encoded in a revenue key
///
/// Returns `None` for keys that are not revenue keys.
pub fn parse_period(key: &str) -> Option<(NaiveDate, NaiveDate)> {
    let mut segments = key.split(SEPARATOR);
    if segments.next()? != KEY_PREFIX {
        return None;
    }
    let _detail = segments.next()?;
    let start = segments.next()?.parse().ok()?;
    let end = segments.next()?.parse().ok()?;
    Some((start, end))
}
