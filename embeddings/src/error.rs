//! Error types for embedding functions.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors an embedding function or similarity computation can return.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The underlying embedding backend rejected the request.
    #[error("embedding request failed: {0}")]
    ApiRequest(String),

    /// The backend answered with something that is not an embedding.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Two vectors of different lengths were compared.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Nothing to embed.
    #[error("cannot embed empty text")]
    EmptyInput,
}
