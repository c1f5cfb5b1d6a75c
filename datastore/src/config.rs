//! Configuration for the datastore.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the index DSN.
pub const INDEX_DSN_ENV: &str = "KNOW_INDEX_DSN";

/// Environment variable overriding the vector DSN.
pub const VECTOR_DSN_ENV: &str = "KNOW_VECTOR_DSN";

/// Environment variable overriding the scratch directory.
pub const SCRATCH_DIR_ENV: &str = "KNOW_SCRATCH_DIR";

/// Configuration for opening a datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Index store DSN; the platform default when unset.
    pub index_dsn: Option<String>,

    /// Vector store DSN; the platform default when unset.
    pub vector_dsn: Option<String>,

    /// Whether to migrate the index schema while opening it.
    pub auto_migrate: bool,

    /// Parent of the temporary directories used by export and import.
    /// The system temp directory when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            index_dsn: None,
            vector_dsn: None,
            auto_migrate: true,
            scratch_dir: None,
        }
    }
}

impl DatastoreConfig {
    /// Defaults overridden by the `KNOW_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            index_dsn: non_empty(INDEX_DSN_ENV),
            vector_dsn: non_empty(VECTOR_DSN_ENV),
            scratch_dir: non_empty(SCRATCH_DIR_ENV).map(PathBuf::from),
            ..Self::default()
        }
    }

    /// Set the index DSN.
    pub fn with_index_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.index_dsn = Some(dsn.into());
        self
    }

    /// Set the vector DSN.
    pub fn with_vector_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.vector_dsn = Some(dsn.into());
        self
    }

    /// Set the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}
