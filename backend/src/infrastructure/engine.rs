/// Process-wide wiring of store, artifacts, provider and services
use std::sync::Arc;
use tracing::info;

use crate::application::errors::RetrievalResult;
use crate::application::providers::EmbeddingProvider;
use crate::application::repositories::StoreResult;
use crate::application::services::{ContextRetriever, ImportService, IndexBuilder};
use crate::application::use_cases::SimilaritySearcher;
use crate::infrastructure::config::{EmbeddingBackend, EmbeddingConfig, RetrievalConfig};
use crate::infrastructure::embeddings::{Chunker, FastEmbedService, HashingEmbedder};
use crate::infrastructure::persistence::{FileArtifactStore, SqliteDocumentStore};

pub type Builder = IndexBuilder<SqliteDocumentStore, FileArtifactStore>;
pub type Searcher = SimilaritySearcher<SqliteDocumentStore, FileArtifactStore>;
pub type Importer = ImportService<SqliteDocumentStore, FileArtifactStore>;
pub type Retriever = ContextRetriever<SqliteDocumentStore, FileArtifactStore>;

/// Everything a process needs, built once from a `RetrievalConfig`.
///
/// The one embedding provider and the one index builder are shared by every
/// service handed out here.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    store: Arc<SqliteDocumentStore>,
    artifacts: Arc<FileArtifactStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    builder: Arc<Builder>,
    searcher: Arc<Searcher>,
}

impl RetrievalEngine {
    /// Open the configured database and artifact directory
    pub fn open(config: RetrievalConfig) -> StoreResult<Self> {
        let embedder = Self::embedder_for(&config.embedding);
        Self::with_embedder(config, embedder)
    }

    /// Like `open`, with an explicit provider
    pub fn with_embedder(
        config: RetrievalConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> StoreResult<Self> {
        let store = Arc::new(SqliteDocumentStore::new_with_path(config.database_path())?);
        let artifacts = Arc::new(FileArtifactStore::new(config.artifact_dir()));
        let builder = Arc::new(
            IndexBuilder::new(store.clone(), artifacts.clone(), embedder.clone())
                .with_batch_size(config.embedding.batch_size),
        );
        let searcher = Arc::new(SimilaritySearcher::new(
            store.clone(),
            artifacts.clone(),
            embedder.clone(),
        ));

        info!(
            "Retrieval engine opened: database {}, artifacts {}",
            config.database_path().display(),
            config.artifact_dir().display()
        );

        Ok(RetrievalEngine {
            config,
            store,
            artifacts,
            embedder,
            builder,
            searcher,
        })
    }

    /// The provider selected by the embedding configuration
    pub fn embedder_for(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
        match config.backend {
            EmbeddingBackend::FastEmbed => Arc::new(
                FastEmbedService::new(config.primary_model)
                    .with_fallback(config.fallback_model)
                    .with_cache_dir(config.cache_dir.clone())
                    .with_download_progress(config.show_download_progress)
                    .with_batch_size(config.batch_size),
            ),
            EmbeddingBackend::Hashing => {
                info!(
                    "Using the offline hashing embedder ({} dimensions)",
                    config.hashing_dimension
                );
                Arc::new(HashingEmbedder::new(config.hashing_dimension))
            }
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SqliteDocumentStore> {
        &self.store
    }

    pub fn artifacts(&self) -> &Arc<FileArtifactStore> {
        &self.artifacts
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn builder(&self) -> &Arc<Builder> {
        &self.builder
    }

    pub fn searcher(&self) -> &Arc<Searcher> {
        &self.searcher
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.config.chunking.chunk_size, self.config.chunking.overlap)
    }

    /// Importer storing one document per source item
    pub fn importer(&self) -> Importer {
        ImportService::new(self.store.clone(), self.builder.clone())
    }

    /// Importer splitting long knowledge entries with the configured chunker
    pub fn chunked_importer(&self) -> Importer {
        self.importer().with_chunking(self.chunker())
    }

    /// Retriever over the `knowledge_base` index, initialized
    pub fn context_retriever(&self) -> RetrievalResult<Arc<Retriever>> {
        let retriever = ContextRetriever::new(self.builder.clone(), self.searcher.clone())?;
        retriever.initialize()?;
        Ok(Arc::new(retriever))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repositories::IndexRegistry;
    use crate::domain::EmbeddingModel;
    use tempfile::TempDir;

    fn offline_config(dir: &TempDir) -> RetrievalConfig {
        let mut config = RetrievalConfig::with_data_dir(dir.path());
        config.embedding.backend = EmbeddingBackend::Hashing;
        config.embedding.hashing_dimension = 48;
        config
    }

    #[test]
    fn test_open_creates_database_under_data_dir() {
        let dir = TempDir::new().unwrap();
        let engine = RetrievalEngine::open(offline_config(&dir)).unwrap();
        assert!(dir.path().join("retrieval.sqlite3").exists());
        assert_eq!(
            engine.embedder().load().unwrap(),
            EmbeddingModel::Hashing { dimension: 48 }
        );
        assert_eq!(engine.artifacts().root(), dir.path().join("vector_indices"));
    }

    #[test]
    fn test_context_retriever_registers_knowledge_base() {
        let dir = TempDir::new().unwrap();
        let engine = RetrievalEngine::open(offline_config(&dir)).unwrap();
        let retriever = engine.context_retriever().unwrap();

        assert_eq!(retriever.index().as_str(), "knowledge_base");
        let indexes = engine.store().list_indexes().unwrap();
        assert_eq!(indexes.len(), 1);
        assert!(retriever.retrieve("anything", 3).is_empty());
    }

    #[test]
    fn test_chunker_follows_config() {
        let dir = TempDir::new().unwrap();
        let mut config = offline_config(&dir);
        config.chunking.chunk_size = 120;
        config.chunking.overlap = 10;
        let engine = RetrievalEngine::open(config).unwrap();
        assert_eq!(engine.chunker(), Chunker::new(120, 10));
    }
}
