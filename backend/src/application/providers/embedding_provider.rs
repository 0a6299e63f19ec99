use crate::domain::{EmbeddingModel, EmbeddingVector};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// No model could be loaded; fatal for the provider
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// A loaded model failed to encode a batch
    #[error("Failed to encode {batch_size} texts: {reason}")]
    Encode { batch_size: usize, reason: String },

    #[error("Model {model} returned a vector of dimension {actual}, expected {expected}")]
    DimensionMismatch {
        model: EmbeddingModel,
        expected: usize,
        actual: usize,
    },

    #[error("Model returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding provider lock poisoned")]
    LockPoisoned,
}

/// Turns text into fixed-dimension vectors.
///
/// One provider instance is constructed per process and shared by reference with
/// every component that encodes. For a given loaded model, `encode` is
/// deterministic and always returns vectors of `load()?.dimension_count()`
/// dimensions, one per input text and in input order.
pub trait EmbeddingProvider: Send + Sync {
    /// Performs the one-time initialization and returns the model now serving
    /// requests. Later calls return the already loaded model.
    fn load(&self) -> Result<EmbeddingModel, EmbeddingError>;

    /// Encodes a batch of texts, loading the model first if needed.
    fn encode(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError>;

    /// Encodes a single text.
    fn encode_one(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        self.encode(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }
}
