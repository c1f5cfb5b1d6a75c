//! The vector store capability consumed by the datastore.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A piece of content and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Unique identifier within the collection.
    pub id: String,

    /// The embedded text.
    pub content: String,

    /// String metadata, e.g. the source file.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// The embedding. Empty until computed by the store.
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl VectorDocument {
    /// Create a document with a fresh id and no embedding.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata: BTreeMap::new(),
            embedding: Vec::new(),
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Provide a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

/// A search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id.
    pub id: String,

    /// Document content.
    pub content: String,

    /// Document metadata.
    pub metadata: BTreeMap<String, String>,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Operations every vector backend provides.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Remove a collection and all of its documents.
    async fn remove_collection(&self, name: &str) -> Result<()>;

    /// Whether the collection exists.
    async fn has_collection(&self, name: &str) -> bool;

    /// Names of all collections, sorted.
    async fn list_collections(&self) -> Vec<String>;

    /// Add documents, embedding those without an embedding. Documents with
    /// an existing id are replaced. Returns the ids in input order.
    async fn add_documents(
        &self,
        collection: &str,
        documents: Vec<VectorDocument>,
    ) -> Result<Vec<String>>;

    /// Remove documents by id. Unknown ids are ignored.
    async fn remove_documents(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// All documents of a collection, ordered by id.
    async fn documents(&self, collection: &str) -> Result<Vec<VectorDocument>>;

    /// The `k` documents most similar to `query`.
    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Write the given collections (all when empty) into a snapshot file
    /// inside `dir` and return its path.
    async fn export_collections_to_file(
        &self,
        dir: &Path,
        collections: &[String],
    ) -> Result<PathBuf>;

    /// Load collections from the snapshot at `path`, restricted to
    /// `collections` when it is not empty. Existing collections with the
    /// same name are replaced.
    async fn import_collections_from_file(
        &self,
        path: &Path,
        collections: &[String],
    ) -> Result<()>;
}
