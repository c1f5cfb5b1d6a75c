//! # Knowledge Datastore
//!
//! One logical datastore over two backends: a relational index store that
//! tracks datasets and files, and a vector store that holds the embedded
//! documents of each dataset.
//!
//! ## Features
//!
//! - **DSN Resolution**: Platform defaults for unset DSNs and archive detection
//! - **Backend Registry**: Scheme-to-constructor lookup for both stores
//! - **Dataset Management**: Datasets created and deleted on both backends together
//! - **Archives**: Export of selected datasets into one portable zip and import back
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Datastore                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  resolve_dsns ──► backends ──► IndexStore      VectorStore      │
//! │                                    │               │            │
//! │                                    ▼               ▼            │
//! │                              knowledge.db   vectorstore.gob     │
//! │                                    └───── zip ─────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use knowledge_datastore::Datastore;
//! use knowledge_embeddings::HashEmbeddingProvider;
//!
//! let datastore = Datastore::new("", true, "", Arc::new(HashEmbeddingProvider::new())).await?;
//! datastore.ingest("default", "/notes/a.md", vec!["hello".to_string()]).await?;
//! let archive = datastore.export_datasets_to_file("/backups", &[]).await?;
//! ```

pub mod archive;
pub mod backends;
pub mod config;
pub mod datastore;
pub mod dsn;
pub mod error;

pub use archive::{EXPORT_PREFIX, IMPORT_PREFIX, UnpackedArchive, export_file_name};
pub use config::DatastoreConfig;
pub use datastore::{Datastore, DatastoreBuilder, FILE_ID_METADATA_KEY, SOURCE_METADATA_KEY};
pub use dsn::{
    ARCHIVE_MARKER, DataDirProvider, Dsn, FixedDataDir, PlatformDataDir, ResolvedDsns,
    resolve_dsns,
};
pub use error::{BackendError, DatastoreError, ErrorKind, Result};

// Re-export the backend crates callers need to name records and traits.
pub use knowledge_embeddings;
pub use knowledge_index;
pub use knowledge_vectorstore;

/// Dataset every non-archive datastore is guaranteed to have.
pub const DEFAULT_DATASET: &str = "default";
