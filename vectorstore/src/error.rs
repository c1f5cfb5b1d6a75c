//! Error types for the vector store.

use thiserror::Error;

use knowledge_embeddings::EmbeddingError;

/// Result type alias for vector store operations.
pub type Result<T> = std::result::Result<T, VectorStoreError>;

/// Errors that can occur in the vector store.
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// Collection not found.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection already exists.
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// Embedding or similarity computation failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The snapshot file is not one this store can read.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
