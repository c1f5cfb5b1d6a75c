//! Embedding functions and providers.
//!
//! An [`EmbeddingFunc`] turns one piece of text into a vector. An
//! [`EmbeddingProvider`] is a named source of such a function together with
//! the configuration it was built from.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;
use crate::{DEFAULT_DIMENSION, Embedding};

/// Computes the embedding of a single text.
///
/// Cancellation is expressed by dropping the returned future.
#[async_trait]
pub trait EmbeddingFunc: Send + Sync {
    /// Embed `text` into a dense vector.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// The provider configuration, possibly containing secrets.
    ///
    /// Pass it through [`crate::redact_sensitive`] before logging.
    fn config(&self) -> serde_json::Value;

    /// Dimension of the vectors produced by [`EmbeddingProvider::embedding_func`].
    fn dimension(&self) -> usize;

    /// The embedding function backed by this provider.
    fn embedding_func(&self) -> Arc<dyn EmbeddingFunc>;
}

/// Adapts a synchronous closure to [`EmbeddingFunc`].
pub struct FnEmbedding<F> {
    func: F,
}

impl<F> FnEmbedding<F>
where
    F: Fn(&str) -> Result<Embedding> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> EmbeddingFunc for FnEmbedding<F>
where
    F: Fn(&str) -> Result<Embedding> + Send + Sync,
{
    async fn embed(&self, text: &str) -> Result<Embedding> {
        (self.func)(text)
    }
}

/// Configuration of the [`HashEmbeddingProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEmbeddingConfig {
    /// Model label recorded alongside datasets.
    pub model: String,

    /// Output dimension.
    pub dimension: usize,
}

impl Default for HashEmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "feature-hash-v1".to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }
}

/// Offline embedding provider based on signed feature hashing.
///
/// Every lower-cased alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets; the resulting vector is L2-normalised. Identical
/// texts always produce identical vectors, and texts sharing words score
/// higher under cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct HashEmbeddingProvider {
    config: HashEmbeddingConfig,
}

impl HashEmbeddingProvider {
    /// Create a provider with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.config.dimension = dimension;
        self
    }

    /// Create a provider from an explicit configuration.
    pub fn from_config(config: HashEmbeddingConfig) -> Self {
        Self { config }
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        "hash"
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "dimension": self.config.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn embedding_func(&self) -> Arc<dyn EmbeddingFunc> {
        Arc::new(HashEmbedding {
            dimension: self.config.dimension,
        })
    }
}

struct HashEmbedding {
    dimension: usize,
}

#[async_trait]
impl EmbeddingFunc for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if self.dimension == 0 {
            return Err(EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut embedding = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[index] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(EmbeddingError::EmptyInput);
        }

        normalize(&mut embedding);
        debug!("Hashed {tokens} tokens into {} dimensions", self.dimension);
        Ok(embedding)
    }
}
