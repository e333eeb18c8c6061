//! Persistence module
//!
//! sqlx-based SQLite access to the pharmacy sales data.

pub mod async_connection;
pub mod error;
pub mod sales_store;

pub use async_connection::{AsyncDatabase, AsyncDatabaseConfig, AsyncDatabaseError};
pub use error::map_sqlx_error;
pub use sales_store::SqliteSalesStore;
