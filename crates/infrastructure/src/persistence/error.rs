//! Shared error mapping for the sqlx persistence layer

use application::ports::StorageError;

/// Map a sqlx error to a storage port error
pub fn map_sqlx_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Connection(e.to_string())
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StorageError::Decode(e.to_string())
        },
        other => StorageError::Query(other.to_string()),
    }
}
