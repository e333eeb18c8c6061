//! Application layer - Use cases and orchestration
//!
//! Contains the revenue analytics pipeline (normalization, key derivation,
//! aggregation dispatch, warming and invalidation) and the port definitions
//! that infrastructure adapters implement.

pub mod cache_key;
pub mod envelope;
pub mod error;
pub mod ports;
pub mod services;

pub use cache_key::{CaKeyBuilder, CacheKey, HashThresholds, KeyBuilder, parse_period};
pub use envelope::{CaEnvelope, DataSource, ResponseMeta};
pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
