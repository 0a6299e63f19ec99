pub mod dto;
pub mod errors;
pub mod providers;
pub mod repositories;
pub mod services;
pub mod use_cases;

// Re-export key types to avoid naming conflicts
pub use dto::{KnowledgeEntry, KnowledgeHit, PromptTemplate, SearchHit, SearchRequest};
pub use errors::{RetrievalError, RetrievalResult};
pub use providers::{EmbeddingError, EmbeddingProvider};
pub use repositories::{
    ArtifactError, ArtifactPaths, ArtifactStore, DocumentRepository, IndexRegistry, StoreError,
};
pub use services::{
    ContextRetriever, ImportError, ImportResult, ImportService, ImportSummary, IndexBuilder,
    RebuildOutcome, RebuildStats,
};
pub use use_cases::SimilaritySearcher;
