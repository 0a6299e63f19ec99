/// Import service for loading external corpora into indexes
use crate::application::dto::{KnowledgeEntry, PromptTemplate};
use crate::application::errors::RetrievalError;
use crate::application::repositories::{
    ArtifactStore, DocumentRepository, IndexRegistry, StoreError,
};
use crate::application::services::index_builder::{IndexBuilder, RebuildOutcome};
use crate::domain::{Chunk, DocumentId, DomainError, IndexName, IngestDocument};
use crate::infrastructure::embeddings::Chunker;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// Default index for knowledge base entries
pub const KNOWLEDGE_BASE_INDEX: &str = "knowledge_base";
/// Default index for prompt templates
pub const PROMPT_TEMPLATE_INDEX: &str = "prompt_templates";
/// Default index holding both corpora
pub const COMBINED_INDEX: &str = "combined_index";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid index name: {0}")]
    InvalidIndex(#[from] DomainError),

    #[error("Failed to register index: {0}")]
    Registry(#[from] StoreError),

    #[error("Documents were stored but the rebuild failed: {0}")]
    Rebuild(#[from] RetrievalError),
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Summary of an import operation
#[derive(Debug)]
pub struct ImportSummary {
    pub index_name: IndexName,
    /// Items stored (created or updated)
    pub imported: usize,
    /// Items that could not be stored
    pub skipped: usize,
    pub errors: Vec<(String, String)>,
    pub rebuild: RebuildOutcome,
    pub duration_ms: u64,
}

impl ImportSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Per-batch counters while upserting
#[derive(Debug, Default)]
struct Tally {
    imported: usize,
    skipped: usize,
    errors: Vec<(String, String)>,
}

impl Tally {
    fn skip(&mut self, item: String, reason: String) {
        warn!("Skipping '{}': {}", item, reason);
        self.skipped += 1;
        self.errors.push((item, reason));
    }

    /// Record a failure that does not count as a skip on its own
    fn error(&mut self, item: String, reason: String) {
        warn!("Failed to store '{}': {}", item, reason);
        self.errors.push((item, reason));
    }
}

/// Imports knowledge base entries and prompt templates.
///
/// Every importer is idempotent: documents are upserted under ids derived from
/// the source ids, so re-running against an unchanged source changes nothing.
/// A failing item is logged and counted as skipped; the rest of the batch continues.
pub struct ImportService<S, A> {
    store: Arc<S>,
    builder: Arc<IndexBuilder<S, A>>,
    chunker: Option<Chunker>,
}

impl<S, A> ImportService<S, A>
where
    S: DocumentRepository + IndexRegistry,
    A: ArtifactStore,
{
    pub fn new(store: Arc<S>, builder: Arc<IndexBuilder<S, A>>) -> Self {
        ImportService {
            store,
            builder,
            chunker: None,
        }
    }

    /// Split long knowledge base entries into chunk documents
    pub fn with_chunking(mut self, chunker: Chunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// One document per entry (`kb_<id>`), then rebuild the index
    pub fn import_knowledge_base(
        &self,
        index_name: &str,
        entries: &[KnowledgeEntry],
    ) -> ImportResult<ImportSummary> {
        let start = Instant::now();
        let index = self.prepare_index(index_name, "Knowledge base vector index")?;

        let mut tally = Tally::default();
        self.upsert_knowledge(&index, entries, &mut tally);

        self.finish(index, tally, start)
    }

    /// One document per template (`prompt_<id>`), then rebuild the index
    pub fn import_prompt_templates(
        &self,
        index_name: &str,
        templates: &[PromptTemplate],
    ) -> ImportResult<ImportSummary> {
        let start = Instant::now();
        let index = self.prepare_index(index_name, "Prompt template vector index")?;

        let mut tally = Tally::default();
        self.upsert_templates(&index, templates, &mut tally);

        self.finish(index, tally, start)
    }

    /// Both corpora into one shared index, rebuilt once
    pub fn import_all(
        &self,
        index_name: &str,
        entries: &[KnowledgeEntry],
        templates: &[PromptTemplate],
    ) -> ImportResult<ImportSummary> {
        let start = Instant::now();
        let index = self.prepare_index(
            index_name,
            "Combined knowledge base and prompt template vector index",
        )?;

        let mut tally = Tally::default();
        self.upsert_knowledge(&index, entries, &mut tally);
        self.upsert_templates(&index, templates, &mut tally);

        self.finish(index, tally, start)
    }

    fn prepare_index(&self, index_name: &str, description: &str) -> ImportResult<IndexName> {
        let index = IndexName::new(index_name)?;
        self.store.ensure_index(&index, description)?;
        Ok(index)
    }

    fn finish(&self, index: IndexName, tally: Tally, start: Instant) -> ImportResult<ImportSummary> {
        let rebuild = self.builder.rebuild(&index).map_err(|e| {
            error!("Rebuild of index '{}' failed after import: {}", index, e);
            e
        })?;

        let summary = ImportSummary {
            index_name: index,
            imported: tally.imported,
            skipped: tally.skipped,
            errors: tally.errors,
            rebuild,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Imported {} items into '{}' ({} skipped) in {} ms",
            summary.imported, summary.index_name, summary.skipped, summary.duration_ms
        );
        Ok(summary)
    }

    fn upsert_templates(&self, index: &IndexName, templates: &[PromptTemplate], tally: &mut Tally) {
        for template in templates {
            let label = format!("prompt_{}", template.id);
            match template.to_document() {
                Ok(document) => self.upsert_one(index, document, label, tally),
                Err(e) => tally.skip(label, e.to_string()),
            }
        }
    }

    fn upsert_knowledge(&self, index: &IndexName, entries: &[KnowledgeEntry], tally: &mut Tally) {
        let existing = match self.chunker {
            Some(_) => self.existing_ids(index),
            None => HashSet::new(),
        };

        for entry in entries {
            let label = format!("kb_{}", entry.id);
            let document = match entry.to_document() {
                Ok(document) => document,
                Err(e) => {
                    tally.skip(label, e.to_string());
                    continue;
                }
            };

            match &self.chunker {
                Some(chunker) => {
                    self.upsert_chunked(index, chunker, document, &existing, label, tally)
                }
                None => self.upsert_one(index, document, label, tally),
            }
        }
    }

    /// Store an entry as `<parent>#<n>` chunk documents, or as one document if it
    /// fits in a single chunk, and drop the leftovers of a previous split.
    fn upsert_chunked(
        &self,
        index: &IndexName,
        chunker: &Chunker,
        parent: IngestDocument,
        existing: &HashSet<String>,
        label: String,
        tally: &mut Tally,
    ) {
        let chunks = chunker.chunk_document(&parent.document_id, &parent.source, &parent.text);

        let mut keep: HashSet<String> = HashSet::new();
        if chunks.len() <= 1 {
            keep.insert(parent.document_id.to_string());
            self.upsert_one(index, parent.clone(), label, tally);
        } else {
            let mut failed = 0;
            for chunk in &chunks {
                let stored = self.chunk_document(&parent, chunk).and_then(|document| {
                    keep.insert(document.document_id.to_string());
                    self.store.upsert(index, document).map_err(|e| e.to_string())
                });
                if let Err(reason) = stored {
                    failed += 1;
                    tally.error(format!("{}#{}", label, chunk.index), reason);
                }
            }
            if failed == 0 {
                tally.imported += 1;
            } else {
                tally.skip(label, format!("{} of {} chunks failed", failed, chunks.len()));
            }
        }

        let prefix = format!("{}#", parent.document_id);
        let stale = existing.iter().filter(|id| {
            (id.as_str() == parent.document_id.as_str() || id.starts_with(&prefix))
                && !keep.contains(id.as_str())
        });
        for id in stale {
            let Ok(document_id) = DocumentId::new(id.as_str()) else {
                continue;
            };
            if let Err(e) = self.store.delete_document(index, &document_id) {
                warn!("Failed to remove stale chunk '{}': {}", id, e);
            }
        }
    }

    fn chunk_document(&self, parent: &IngestDocument, chunk: &Chunk) -> Result<IngestDocument, String> {
        let mut metadata = parent.metadata.clone();
        metadata.insert(
            "parent_document_id".to_string(),
            json!(parent.document_id.as_str()),
        );
        metadata.insert("chunk_index".to_string(), json!(chunk.index));
        metadata.insert("total_chunks".to_string(), json!(chunk.total));

        Ok(
            IngestDocument::new(
                chunk.document_id().map_err(|e| e.to_string())?,
                chunk.text.clone(),
                chunk.source.clone(),
            )
                .with_metadata(metadata),
        )
    }

    fn upsert_one(&self, index: &IndexName, document: IngestDocument, label: String, tally: &mut Tally) {
        match self.store.upsert(index, document) {
            Ok(_) => tally.imported += 1,
            Err(e) => tally.skip(label, e.to_string()),
        }
    }

    fn existing_ids(&self, index: &IndexName) -> HashSet<String> {
        match self.store.list_for_index(index) {
            Ok(documents) => documents
                .iter()
                .map(|d| d.document_id().to_string())
                .collect(),
            Err(e) => {
                warn!("Could not list existing documents of '{}': {}", index, e);
                HashSet::new()
            }
        }
    }
}
