//! # Vector Store
//!
//! Per-dataset collections of embedded documents. Each collection is named
//! after the dataset it mirrors in the index store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Vector Store                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  VectorStore (trait) ◄── PersistentVectorStore                 │
//! │       │                        │                                │
//! │       ▼                        ▼                                │
//! │  EmbeddingFunc          <root>/<hash>.json    vectorstore.gob  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod persistent;
pub mod snapshot;
pub mod store;

pub use error::{Result, VectorStoreError};
pub use persistent::PersistentVectorStore;
pub use snapshot::{Collection, Snapshot};
pub use store::{SearchHit, VectorDocument, VectorStore};

/// File name of the snapshot written by [`VectorStore::export_collections_to_file`].
pub const SNAPSHOT_FILE_NAME: &str = "vectorstore.gob";
