//! Sales database (SQLite) configuration.

use serde::{Deserialize, Serialize};

use super::default_true;
use crate::persistence::AsyncDatabaseConfig;

/// SQLite sales database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (e.g. "sqlite:sales.db" or "sqlite::memory:")
    #[serde(default = "default_db_url")]
    pub url: String,

    /// Maximum number of concurrent database connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Whether to run pending migrations on startup (default: true)
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_url() -> String {
    "sqlite:ca-analytics.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_min_connections() -> u32 {
    1
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Pool settings for [`AsyncDatabase::new`](crate::persistence::AsyncDatabase::new)
    #[must_use]
    pub fn pool_config(&self) -> AsyncDatabaseConfig {
        let in_memory = self.url.contains(":memory:");
        AsyncDatabaseConfig {
            url: self.url.clone(),
            max_connections: if in_memory { 1 } else { self.max_connections },
            min_connections: self.min_connections,
            wal_mode: !in_memory,
            foreign_keys: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_uses_wal() {
        let pool = DatabaseConfig::default().pool_config();
        assert_eq!(pool.url, "sqlite:ca-analytics.db");
        assert!(pool.wal_mode);
        assert_eq!(pool.max_connections, 5);
    }

    #[test]
    fn in_memory_database_is_single_connection() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".into(),
            ..DatabaseConfig::default()
        };
        let pool = config.pool_config();
        assert!(!pool.wal_mode);
        assert_eq!(pool.max_connections, 1);
    }
}
