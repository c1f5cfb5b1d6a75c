//! Error types for the index store.

use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur in the index store.
#[derive(Error, Debug)]
pub enum IndexError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer schema than this binary knows.
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    /// Dataset not found.
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// Dataset already exists.
    #[error("dataset already exists: {0}")]
    DatasetExists(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking database task panicked or was cancelled.
    #[error("index task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A previous holder of the connection panicked.
    #[error("index connection lock poisoned")]
    LockPoisoned,
}
