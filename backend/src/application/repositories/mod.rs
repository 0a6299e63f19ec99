mod artifact_store;
mod document_repository;
mod index_registry;

pub use artifact_store::{ArtifactError, ArtifactPaths, ArtifactResult, ArtifactStore};
pub use document_repository::DocumentRepository;
pub use index_registry::IndexRegistry;

use crate::domain::DomainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Document '{document_id}' not found in index '{index}'")]
    DocumentNotFound { index: String, document_id: String },

    #[error("Corrupt row: {0}")]
    InvalidRow(#[from] DomainError),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;
