//! Application configuration
//!
//! Split into focused sub-modules:
//! - `cache`: tier limits, remote backend, TTL policy
//! - `database`: SQLite sales database
//! - `kpi`: request bounds and key hashing thresholds
//!
//! Telemetry settings live with [`crate::telemetry`].

mod cache;
mod database;
mod kpi;

use serde::{Deserialize, Serialize};

pub use cache::{CacheConfig, RemoteBackend};
pub use database::DatabaseConfig;
pub use kpi::KpiConfig;

use crate::telemetry::TelemetryConfig;

/// Prefix of environment overrides, e.g. `CA_ANALYTICS__CACHE__BACKEND=redb`
pub const ENV_PREFIX: &str = "CA_ANALYTICS";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub kpi: KpiConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `config.toml` (optional) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the named file (extension optional, file
    /// optional) with environment overrides on top
    pub fn load_from(file: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("cache.namespace", crate::cache::DEFAULT_NAMESPACE)?
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from("/nonexistent/ca-analytics-config").unwrap();
        assert_eq!(config.cache.namespace, "pharmacy-analytics");
        assert_eq!(config.kpi.limits.max_range_days, 365);
        assert!(config.database.run_migrations);
    }

    #[test]
    fn toml_file_overrides_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cache]
backend = "redb"
max_memory_entries = 50

[cache.ttl]
summary_secs = 120

[kpi.limits]
max_range_days = 90

[telemetry]
json = true
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.cache.backend, RemoteBackend::Redb);
        assert_eq!(config.cache.max_memory_entries, 50);
        assert_eq!(config.cache.ttl.summary_secs, 120);
        assert_eq!(config.cache.ttl.product_secs, 900);
        assert_eq!(config.kpi.limits.max_range_days, 90);
        assert!(config.telemetry.json);
    }
}
