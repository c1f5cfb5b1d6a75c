//! # Embeddings
//!
//! This crate provides the embedding side of the knowledge datastore.
//!
//! ## Features
//!
//! - **Embedding Functions**: The async `text -> vector` contract consumed by vector stores
//! - **Instrumentation**: Lifecycle logging around any embedding function
//! - **Providers**: Named sources of an embedding function plus a redactable configuration
//! - **Similarity**: Cosine scoring and top-k selection for brute-force search
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► EmbeddingFunc ──► LoggedEmbeddingFunc    │
//! │       │                                        │                │
//! │       ▼                                        ▼                │
//! │  config() ──► redact_sensitive          VectorStore (caller)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod instrument;
pub mod provider;
pub mod redact;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use instrument::{LoggedEmbeddingFunc, log_embedding_func};
pub use provider::{
    EmbeddingFunc, EmbeddingProvider, FnEmbedding, HashEmbeddingConfig, HashEmbeddingProvider,
};
pub use redact::redact_sensitive;
pub use similarity::{SimilarityResult, cosine_similarity, find_top_k, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default dimension of the offline hashing provider.
pub const DEFAULT_DIMENSION: usize = 384;
