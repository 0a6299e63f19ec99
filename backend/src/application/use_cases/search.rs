use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::dto::{SearchHit, SearchRequest};
use crate::application::errors::{RetrievalError, RetrievalResult};
use crate::application::providers::EmbeddingProvider;
use crate::application::repositories::{ArtifactStore, DocumentRepository};
use crate::domain::IndexName;

/// Use case for nearest-neighbour search over a persisted index
///
/// The query is embedded with the shared provider and compared against every row
/// of the artifact by Euclidean distance. Exact brute force is fine for the
/// corpus sizes served here (tens to low thousands of documents).
pub struct SimilaritySearcher<S, A> {
    store: Arc<S>,
    artifacts: Arc<A>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl<S, A> SimilaritySearcher<S, A>
where
    S: DocumentRepository,
    A: ArtifactStore,
{
    pub fn new(store: Arc<S>, artifacts: Arc<A>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            artifacts,
            embedder,
        }
    }

    pub fn execute(&self, request: &SearchRequest) -> RetrievalResult<Vec<SearchHit>> {
        self.search(&request.index, &request.query, request.top_k)
    }

    /// Return up to `top_k` documents closest to `query`, best first.
    ///
    /// An index without an artifact yields an empty list. Artifact rows whose
    /// document has since been deleted are skipped and the next candidate is used.
    pub fn search(
        &self,
        index: &IndexName,
        query: &str,
        top_k: usize,
    ) -> RetrievalResult<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }

        let Some(artifact) = self.artifacts.load(index)? else {
            debug!("Index '{}' has no artifact, returning no results", index);
            return Ok(Vec::new());
        };

        let active_model = self.embedder.load()?;
        if artifact.embedding_model() != active_model {
            return Err(RetrievalError::ModelMismatch {
                index: index.to_string(),
                artifact_model: artifact.embedding_model(),
                active_model,
            });
        }

        let query_vector = self.embedder.encode_one(query)?;
        if query_vector.dimension_count() != artifact.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                index: index.to_string(),
                expected: artifact.dimension(),
                actual: query_vector.dimension_count(),
            });
        }

        let mut ranked = Vec::with_capacity(artifact.len());
        for (position, document_id, row) in artifact.rows() {
            let distance = query_vector.euclidean_distance(row)?;
            ranked.push((position, document_id, distance));
        }
        // Stable order: distance first, earlier position wins ties.
        ranked.sort_by(|a, b| match a.2.total_cmp(&b.2) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        let mut hits = Vec::with_capacity(top_k.min(ranked.len()));
        for (_, document_id, distance) in ranked {
            if hits.len() == top_k {
                break;
            }
            match self.store.find_document(index, document_id)? {
                Some(document) => hits.push(SearchHit::from_document(document, distance)),
                None => warn!(
                    "Document '{}' is in the artifact of index '{}' but no longer stored, skipping",
                    document_id, index
                ),
            }
        }

        debug!(
            "Search on '{}' returned {} of {} candidates",
            index,
            hits.len(),
            artifact.len()
        );
        Ok(hits)
    }
}
