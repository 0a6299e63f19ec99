/// Service that turns the documents of an index into a persisted artifact
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::application::errors::{RetrievalError, RetrievalResult};
use crate::application::providers::{EmbeddingError, EmbeddingProvider};
use crate::application::repositories::{
    ArtifactStore, DocumentRepository, IndexRegistry,
};
use crate::domain::{
    EmbeddingModel, EmbeddingVector, IndexArtifact, IndexName, IndexState, RebuildRecord,
    VectorIndex,
};

/// Default number of texts handed to the provider per `encode` call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Result of a rebuild
#[derive(Debug, Clone, PartialEq)]
pub enum RebuildOutcome {
    /// The index has no documents; no artifact was touched
    Skipped,
    Rebuilt(RebuildStats),
}

impl RebuildOutcome {
    pub fn document_count(&self) -> usize {
        match self {
            RebuildOutcome::Skipped => 0,
            RebuildOutcome::Rebuilt(stats) => stats.document_count,
        }
    }
}

/// Statistics from a rebuild
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildStats {
    pub document_count: usize,
    pub vector_dimension: usize,
    pub embedding_model: EmbeddingModel,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Builds and replaces index artifacts.
///
/// Every rebuild re-embeds every document of the index, so its cost is O(N)
/// regardless of how many documents changed; between an upsert and the next
/// rebuild the index is `Stale` but still searchable. Rebuilds of one index are
/// serialized through a per-index lock; rebuilds of different indexes may run in
/// parallel. Construct one builder per process and share it.
pub struct IndexBuilder<S, A> {
    store: Arc<S>,
    artifacts: Arc<A>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    rebuild_locks: Mutex<HashMap<IndexName, Arc<Mutex<()>>>>,
}

impl<S, A> IndexBuilder<S, A>
where
    S: DocumentRepository + IndexRegistry,
    A: ArtifactStore,
{
    pub fn new(store: Arc<S>, artifacts: Arc<A>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        IndexBuilder {
            store,
            artifacts,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            rebuild_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Re-embed all documents of `name` and atomically replace its artifact
    pub fn rebuild(&self, name: &IndexName) -> RetrievalResult<RebuildOutcome> {
        let lock = self.rebuild_lock(name)?;
        let _guard = lock
            .lock()
            .map_err(|_| RetrievalError::LockPoisoned(name.to_string()))?;

        let start = Instant::now();

        // Read the revision before the documents: a concurrent upsert then leaves
        // the index marked stale rather than wrongly marked built.
        let index = self
            .store
            .get_index(name)?
            .ok_or_else(|| RetrievalError::IndexNotFound(name.to_string()))?;
        let documents = self.store.list_for_index(name)?;

        if documents.is_empty() {
            info!("Index '{}' has no documents, skipping rebuild", name);
            return Ok(RebuildOutcome::Skipped);
        }

        let (ids, texts): (Vec<_>, Vec<_>) = documents
            .iter()
            .map(|d| (d.document_id().clone(), d.text()))
            .unzip();

        let model = self.embedder.load()?;
        if model.is_offline() {
            warn!("Index '{}' is built with the offline {} embedder", name, model);
        }
        if let Some(previous) = index.embedding_model {
            if previous != model {
                warn!(
                    "Index '{}' was built with {}, rebuilding with {}",
                    name, previous, model
                );
            }
        }

        let mut vectors: Vec<EmbeddingVector> = Vec::with_capacity(texts.len());
        let mut batches = 0;
        for batch in texts.chunks(self.batch_size) {
            debug!(
                "Encoding batch {} of {} texts for index '{}'",
                batches + 1,
                batch.len(),
                name
            );
            let encoded = self.embedder.encode(batch)?;
            if encoded.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: encoded.len(),
                }
                .into());
            }
            vectors.extend(encoded);
            batches += 1;
        }

        let artifact = IndexArtifact::from_embeddings(ids, vectors, model)?;
        if artifact.dimension() != model.dimension_count() {
            return Err(EmbeddingError::DimensionMismatch {
                model,
                expected: model.dimension_count(),
                actual: artifact.dimension(),
            }
            .into());
        }

        let paths = self.artifacts.write(name, &artifact)?;

        let record = RebuildRecord {
            document_count: artifact.len(),
            vector_dimension: artifact.dimension(),
            embedding_model: model,
            built_revision: index.revision,
            vector_artifact_path: paths.vectors,
            metadata_artifact_path: paths.metadata,
            rebuilt_at: artifact.built_at(),
        };
        self.store.record_rebuild(name, record)?;

        let stats = RebuildStats {
            document_count: artifact.len(),
            vector_dimension: artifact.dimension(),
            embedding_model: model,
            batches,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Rebuilt index '{}': {} documents, dimension {}, model {}, {} ms",
            name, stats.document_count, stats.vector_dimension, model, stats.duration_ms
        );

        Ok(RebuildOutcome::Rebuilt(stats))
    }

    /// Current lifecycle state of an index
    pub fn index_state(&self, name: &IndexName) -> RetrievalResult<IndexState> {
        self.store
            .get_index(name)?
            .map(|index| index.state())
            .ok_or_else(|| RetrievalError::IndexNotFound(name.to_string()))
    }

    /// Get-or-create an index in the registry
    pub fn create_index(&self, name: &IndexName, description: &str) -> RetrievalResult<VectorIndex> {
        Ok(self.store.ensure_index(name, description)?)
    }

    /// Delete an index, its documents and its artifact files
    pub fn delete_index(&self, name: &IndexName) -> RetrievalResult<bool> {
        let lock = self.rebuild_lock(name)?;
        let _guard = lock
            .lock()
            .map_err(|_| RetrievalError::LockPoisoned(name.to_string()))?;

        let deleted = self.store.delete_index(name)?;
        self.artifacts.remove(name)?;

        if deleted {
            info!("Deleted index '{}'", name);
        }
        Ok(deleted)
    }

    fn rebuild_lock(&self, name: &IndexName) -> RetrievalResult<Arc<Mutex<()>>> {
        let mut locks = self
            .rebuild_locks
            .lock()
            .map_err(|_| RetrievalError::LockPoisoned(name.to_string()))?;
        Ok(Arc::clone(locks.entry(name.clone()).or_default()))
    }
}
