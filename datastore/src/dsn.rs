//! DSN resolution and parsing.
//!
//! A DSN is `<scheme>://<location>`. Locations prefixed with `archive://`
//! point into an unpacked knowledge archive rather than a live store.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DatastoreError, Result};

/// Marks a DSN as pointing into an unpacked archive.
pub const ARCHIVE_MARKER: &str = "://archive://";

/// Scheme of the SQLite index store.
pub const INDEX_SCHEME: &str = "sqlite";

/// Scheme of the persistent vector store.
pub const VECTOR_SCHEME: &str = "chromem";

const DEFAULT_INDEX_FILE: &str = "gptscript/knowledge/knowledge.db";
const DEFAULT_VECTOR_FILE: &str = "gptscript/knowledge/vector.db";
const SCHEME_SEPARATOR: &str = "://";
const ARCHIVE_PREFIX: &str = "archive://";

/// Source of the per-user data directory default DSNs are placed under.
pub trait DataDirProvider: Send + Sync {
    /// The data directory, or `None` when it cannot be determined.
    fn data_dir(&self) -> Option<PathBuf>;
}

/// The platform data directory (`$XDG_DATA_HOME`, `~/Library/Application Support`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDataDir;

impl DataDirProvider for PlatformDataDir {
    fn data_dir(&self) -> Option<PathBuf> {
        dirs::data_dir()
    }
}

/// A fixed data directory.
#[derive(Debug, Clone)]
pub struct FixedDataDir(pub PathBuf);

impl FixedDataDir {
    /// Create a provider that always answers `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self(dir.into())
    }
}

impl DataDirProvider for FixedDataDir {
    fn data_dir(&self) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// DSNs with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDsns {
    pub index_dsn: String,
    pub vector_dsn: String,
    /// Whether either input DSN points into an archive.
    pub is_archive: bool,
}

/// Fill in default DSNs for empty inputs and detect archive DSNs.
///
/// Non-empty inputs are returned untouched. The data directory is only
/// consulted when a default is needed, and nothing is created on disk.
pub fn resolve_dsns(
    index_dsn: &str,
    vector_dsn: &str,
    data_dirs: &dyn DataDirProvider,
) -> Result<ResolvedDsns> {
    let is_archive = index_dsn.contains(ARCHIVE_MARKER) || vector_dsn.contains(ARCHIVE_MARKER);

    let index_dsn = if index_dsn.is_empty() {
        let dsn = default_dsn(INDEX_SCHEME, DEFAULT_INDEX_FILE, data_dirs)?;
        debug!(index_dsn = %dsn, "Using default index DSN");
        dsn
    } else {
        index_dsn.to_string()
    };

    let vector_dsn = if vector_dsn.is_empty() {
        let dsn = default_dsn(VECTOR_SCHEME, DEFAULT_VECTOR_FILE, data_dirs)?;
        debug!(vector_dsn = %dsn, "Using default vector DSN");
        dsn
    } else {
        vector_dsn.to_string()
    };

    Ok(ResolvedDsns {
        index_dsn,
        vector_dsn,
        is_archive,
    })
}

fn default_dsn(scheme: &str, file: &str, data_dirs: &dyn DataDirProvider) -> Result<String> {
    let data_dir = data_dirs.data_dir().ok_or_else(|| {
        DatastoreError::PathResolution("could not determine the user data directory".to_string())
    })?;
    Ok(format!(
        "{scheme}{SCHEME_SEPARATOR}{}",
        data_dir.join(file).display()
    ))
}

/// A parsed DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub scheme: String,
    /// Path or address after the scheme, without the archive prefix.
    pub location: String,
    pub archive: bool,
}

impl Dsn {
    /// Split `<scheme>://[archive://]<location>`.
    pub fn parse(dsn: &str) -> Result<Self> {
        let invalid = |reason: &str| DatastoreError::InvalidDsn {
            dsn: dsn.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = dsn
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme.is_empty() {
            return Err(invalid("empty scheme"));
        }

        let (location, archive) = match rest.strip_prefix(ARCHIVE_PREFIX) {
            Some(location) => (location, true),
            None => (rest, false),
        };
        if location.is_empty() {
            return Err(invalid("empty location"));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            location: location.to_string(),
            archive,
        })
    }

    /// Build an archive DSN for a snapshot file.
    pub fn archive(scheme: &str, path: &Path) -> Self {
        Self {
            scheme: scheme.to_string(),
            location: path.display().to_string(),
            archive: true,
        }
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.archive {
            write!(f, "{}{ARCHIVE_MARKER}{}", self.scheme, self.location)
        } else {
            write!(f, "{}{SCHEME_SEPARATOR}{}", self.scheme, self.location)
        }
    }
}
