//! Vector retrieval for retrieval-augmented generation.
//!
//! Documents are stored per named index in SQLite, embedded in batches into a
//! persisted `N x D` artifact, and searched by exact Euclidean distance.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    ContextRetriever, ImportService, IndexBuilder, KnowledgeEntry, KnowledgeHit, PromptTemplate,
    RetrievalError, SearchHit, SearchRequest, SimilaritySearcher,
};
pub use domain::{DocumentId, EmbeddingModel, IndexName, IndexState};
pub use infrastructure::{RetrievalConfig, RetrievalEngine};
