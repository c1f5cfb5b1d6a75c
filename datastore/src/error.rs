//! Error types for the datastore.

use std::path::PathBuf;

use thiserror::Error;
use zip::result::ZipError;

use knowledge_index::IndexError;
use knowledge_vectorstore::VectorStoreError;

/// Result type alias for datastore operations.
pub type Result<T> = std::result::Result<T, DatastoreError>;

/// Why a backend could not be opened, exported or imported.
#[derive(Error, Debug)]
pub enum BackendError {
    /// No backend is registered for the DSN scheme.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The DSN could not be parsed.
    #[error("{0}")]
    InvalidDsn(String),

    /// The index store failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The vector store failed.
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

/// Errors that can occur in the datastore.
#[derive(Error, Debug)]
pub enum DatastoreError {
    /// The platform data directory could not be determined.
    #[error("failed to determine datastore paths: {0}")]
    PathResolution(String),

    /// A DSN is not of the form `<scheme>://<location>`.
    #[error("invalid DSN {dsn:?}: {reason}")]
    InvalidDsn { dsn: String, reason: String },

    /// The index store could not be opened or migrated.
    #[error("failed to initialize index store {dsn}: {source}")]
    IndexInit {
        dsn: String,
        #[source]
        source: BackendError,
    },

    /// The vector store could not be opened.
    #[error("failed to initialize vector store {dsn}: {source}")]
    VectorStoreInit {
        dsn: String,
        #[source]
        source: BackendError,
    },

    /// The default dataset could not be looked up or created.
    #[error("failed to ensure default dataset: {0}")]
    DefaultDataset(#[source] Box<DatastoreError>),

    /// The archive is missing or not a zip file.
    #[error("failed to open archive {path}: {source}")]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    /// The archive does not hold exactly one `.db` and one `.gob` file.
    #[error("invalid knowledge archive: {0}")]
    ArchiveStructure(String),

    /// A backend failed to write its snapshot.
    #[error("failed to export snapshot: {0}")]
    BackendExport(#[source] BackendError),

    /// A backend failed to apply a snapshot.
    #[error("failed to import snapshot: {0}")]
    BackendImport(#[source] BackendError),

    /// Writing or extracting the archive failed.
    #[error("archive error: {0}")]
    Archive(#[source] ZipError),

    /// Dataset not found.
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// Dataset already exists.
    #[error("dataset already exists: {0}")]
    DatasetExists(String),

    /// Index store error.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Vector store error.
    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fieldless tag of a [`DatastoreError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PathResolution,
    InvalidDsn,
    IndexInit,
    VectorStoreInit,
    DefaultDataset,
    ArchiveOpen,
    ArchiveStructure,
    BackendExport,
    BackendImport,
    Archive,
    DatasetNotFound,
    DatasetExists,
    Index,
    VectorStore,
    Io,
}

impl DatastoreError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathResolution(_) => ErrorKind::PathResolution,
            Self::InvalidDsn { .. } => ErrorKind::InvalidDsn,
            Self::IndexInit { .. } => ErrorKind::IndexInit,
            Self::VectorStoreInit { .. } => ErrorKind::VectorStoreInit,
            Self::DefaultDataset(_) => ErrorKind::DefaultDataset,
            Self::ArchiveOpen { .. } => ErrorKind::ArchiveOpen,
            Self::ArchiveStructure(_) => ErrorKind::ArchiveStructure,
            Self::BackendExport(_) => ErrorKind::BackendExport,
            Self::BackendImport(_) => ErrorKind::BackendImport,
            Self::Archive(_) => ErrorKind::Archive,
            Self::DatasetNotFound(_) => ErrorKind::DatasetNotFound,
            Self::DatasetExists(_) => ErrorKind::DatasetExists,
            Self::Index(_) => ErrorKind::Index,
            Self::VectorStore(_) => ErrorKind::VectorStore,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn archive_io(err: std::io::Error) -> Self {
        Self::Archive(ZipError::Io(err))
    }

    pub(crate) fn task(err: tokio::task::JoinError) -> Self {
        Self::archive_io(std::io::Error::other(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as _;

    #[test]
    fn test_kind_matches_variant() {
        let err = DatastoreError::ArchiveStructure("empty".to_string());
        assert_eq!(err.kind(), ErrorKind::ArchiveStructure);

        let err = DatastoreError::DefaultDataset(Box::new(DatastoreError::DatasetExists(
            "default".to_string(),
        )));
        assert_eq!(err.kind(), ErrorKind::DefaultDataset);
    }

    #[test]
    fn test_init_errors_keep_their_cause() {
        let err = DatastoreError::IndexInit {
            dsn: "mysql://db".to_string(),
            source: BackendError::UnsupportedScheme("mysql".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "failed to initialize index store mysql://db: unsupported scheme: mysql"
        );
        assert!(err.source().is_some());
    }
}
