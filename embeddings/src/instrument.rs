//! Lifecycle logging around embedding functions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, error, info, info_span};

use crate::Embedding;
use crate::error::Result;
use crate::provider::EmbeddingFunc;

/// An [`EmbeddingFunc`] that logs the start, completion and failure of
/// every call to the wrapped function.
///
/// Results and errors are returned exactly as the inner function produced
/// them. The wrapper holds no state besides the inner function.
pub struct LoggedEmbeddingFunc {
    inner: Arc<dyn EmbeddingFunc>,
}

impl LoggedEmbeddingFunc {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn EmbeddingFunc>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EmbeddingFunc for LoggedEmbeddingFunc {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let span = info_span!("embedding", stage = "embedding");

        async {
            info!(stage = "embedding", status = "starting", "Creating embedding");

            match self.inner.embed(text).await {
                Ok(embedding) => {
                    info!(stage = "embedding", status = "completed", "Created embedding");
                    Ok(embedding)
                }
                Err(e) => {
                    error!(
                        stage = "embedding",
                        status = "failed",
                        error = %e,
                        "Failed to create embedding"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Wrap `func` with lifecycle logging.
pub fn log_embedding_func(func: Arc<dyn EmbeddingFunc>) -> Arc<dyn EmbeddingFunc> {
    Arc::new(LoggedEmbeddingFunc::new(func))
}
