/// Knowledge retrieval for chat callers
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::dto::KnowledgeHit;
use crate::application::errors::RetrievalResult;
use crate::application::repositories::{ArtifactStore, DocumentRepository, IndexRegistry};
use crate::application::services::import_service::KNOWLEDGE_BASE_INDEX;
use crate::application::services::index_builder::IndexBuilder;
use crate::application::use_cases::SimilaritySearcher;
use crate::domain::{IndexName, VectorIndex};

/// Rendered when a query found nothing to ground the answer on
pub const NO_CONTEXT_MESSAGE: &str = "No supporting context found.";

/// Looks up knowledge base passages for a user question.
///
/// Retrieval failures never reach the caller: they are logged and the caller
/// proceeds without context.
pub struct ContextRetriever<S, A> {
    index: IndexName,
    builder: Arc<IndexBuilder<S, A>>,
    searcher: Arc<SimilaritySearcher<S, A>>,
}

impl<S, A> ContextRetriever<S, A>
where
    S: DocumentRepository + IndexRegistry + 'static,
    A: ArtifactStore + 'static,
{
    /// Retriever over the default `knowledge_base` index
    pub fn new(
        builder: Arc<IndexBuilder<S, A>>,
        searcher: Arc<SimilaritySearcher<S, A>>,
    ) -> RetrievalResult<Self> {
        Ok(Self::with_index(
            IndexName::new(KNOWLEDGE_BASE_INDEX)?,
            builder,
            searcher,
        ))
    }

    pub fn with_index(
        index: IndexName,
        builder: Arc<IndexBuilder<S, A>>,
        searcher: Arc<SimilaritySearcher<S, A>>,
    ) -> Self {
        Self {
            index,
            builder,
            searcher,
        }
    }

    pub fn index(&self) -> &IndexName {
        &self.index
    }

    /// Make sure the knowledge index is registered
    pub fn initialize(&self) -> RetrievalResult<VectorIndex> {
        let index = self
            .builder
            .create_index(&self.index, "Knowledge base vector index")?;
        info!(
            "Knowledge retrieval ready on index '{}' ({})",
            index.name,
            index.state()
        );
        Ok(index)
    }

    /// Up to `top_k` passages closest to `query`; empty on any failure
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<KnowledgeHit> {
        match self.searcher.search(&self.index, query, top_k) {
            Ok(hits) => {
                debug!("Retrieved {} passages from '{}'", hits.len(), self.index);
                hits.into_iter().map(KnowledgeHit::from).collect()
            }
            Err(e) if e.is_configuration_error() => {
                error!(
                    "No embedding model available for '{}', continuing without context: {}",
                    self.index, e
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "Knowledge retrieval on '{}' failed, continuing without context: {}",
                    self.index, e
                );
                Vec::new()
            }
        }
    }

    /// `retrieve` on the blocking thread pool
    pub async fn retrieve_async(self: Arc<Self>, query: String, top_k: usize) -> Vec<KnowledgeHit> {
        let retriever = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || retriever.retrieve(&query, top_k)).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Knowledge retrieval task failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Format hits as a context block for a prompt
pub fn render_context(hits: &[KnowledgeHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT_MESSAGE.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let name = hit
                .metadata
                .get("name")
                .and_then(|v| v.as_str())
                .filter(|n| !n.is_empty())
                .unwrap_or(hit.id.as_str());
            format!(
                "[{}] {} (similarity {:.3})\n{}",
                i + 1,
                name,
                hit.similarity,
                hit.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
