use crate::application::providers::EmbeddingError;
use crate::application::repositories::{ArtifactError, StoreError};
use crate::domain::{DomainError, EmbeddingModel};
use thiserror::Error;

/// Errors surfaced by rebuilds and searches
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Index '{index}' was built with {artifact_model}, but the active model is {active_model}")]
    ModelMismatch {
        index: String,
        artifact_model: EmbeddingModel,
        active_model: EmbeddingModel,
    },

    #[error("Query vector has dimension {actual}, index '{index}' expects {expected}")]
    DimensionMismatch {
        index: String,
        expected: usize,
        actual: usize,
    },

    #[error("Rebuild lock poisoned for index '{0}'")]
    LockPoisoned(String),
}

impl RetrievalError {
    /// True when a persisted artifact disagrees with itself
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, RetrievalError::Artifact(ArtifactError::Consistency { .. }))
    }

    /// True when the embedding model could not be initialized
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RetrievalError::Embedding(EmbeddingError::ModelUnavailable(_))
        )
    }
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
