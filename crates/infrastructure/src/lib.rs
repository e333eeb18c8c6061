//! Infrastructure layer - Adapters for external systems
//!
//! Implements the ports defined in the application layer: the tiered report
//! cache (memory + Redis or redb) and the SQLite sales store. Also hosts
//! configuration loading and telemetry setup.

pub mod cache;
pub mod config;
pub mod persistence;
pub mod telemetry;
#[cfg(test)]
pub mod testing;

pub use cache::{MemoryTier, RedbTier, RedisTier, RemoteTier, TieredCache, glob_to_regex};
pub use config::{AppConfig, CacheConfig, DatabaseConfig, KpiConfig, RemoteBackend};
pub use persistence::{AsyncDatabase, AsyncDatabaseConfig, SqliteSalesStore};
pub use telemetry::{TelemetryConfig, TelemetryError, init_telemetry};
