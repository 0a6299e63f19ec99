/// Domain entities: stored documents and the vector index registry record
use super::base::{DomainResult, Entity};
use super::value_objects::{DocumentId, EmbeddingModel, IndexName, Metadata};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Source tag for knowledge base entries
pub const KNOWLEDGE_BASE_SOURCE: &str = "knowledge_base";
/// Source tag for prompt templates
pub const PROMPT_TEMPLATE_SOURCE: &str = "prompt_template";

/// A document as handed to the store by an importer.
///
/// This is the ingestion interface: `(document_id, text, source, metadata)`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestDocument {
    pub document_id: DocumentId,
    pub text: String,
    pub source: String,
    pub metadata: Metadata,
}

impl IngestDocument {
    pub fn new(document_id: DocumentId, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            document_id,
            text: text.into(),
            source: source.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A stored document, keyed by `(index_name, document_id)`.
///
/// `internal_id` is assigned at insertion and never changes; it defines the stable
/// order in which an index lists its documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    internal_id: i64,
    index_name: IndexName,
    document_id: DocumentId,
    source: String,
    text: String,
    metadata: Metadata,
    updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        internal_id: i64,
        index_name: IndexName,
        document_id: DocumentId,
        source: String,
        text: String,
        metadata: Metadata,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            internal_id,
            index_name,
            document_id,
            source,
            text,
            metadata,
            updated_at,
        }
    }

    pub fn internal_id(&self) -> i64 {
        self.internal_id
    }

    pub fn index_name(&self) -> &IndexName {
        &self.index_name
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether an upsert of `incoming` would change this document
    pub fn differs_from(&self, incoming: &IngestDocument) -> bool {
        self.text != incoming.text
            || self.source != incoming.source
            || self.metadata != incoming.metadata
    }
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.document_id
    }
}

/// Lifecycle state of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// No artifact has been built yet
    Empty,
    /// Artifact present and matches the documents it was built from
    Built,
    /// Documents changed since the last rebuild; the artifact is still searchable
    Stale,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexState::Empty => write!(f, "empty"),
            IndexState::Built => write!(f, "built"),
            IndexState::Stale => write!(f, "stale"),
        }
    }
}

/// Registry record of a named vector index.
///
/// `document_count` grows by one for every newly created document and is reset to
/// the embedded count by each rebuild. `revision` is bumped by every document
/// change; `built_revision` is the revision the current artifact was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorIndex {
    pub name: IndexName,
    pub description: String,
    pub document_count: usize,
    pub vector_dimension: Option<usize>,
    #[serde(serialize_with = "serialize_model")]
    pub embedding_model: Option<EmbeddingModel>,
    pub vector_artifact_path: Option<PathBuf>,
    pub metadata_artifact_path: Option<PathBuf>,
    pub revision: u64,
    pub built_revision: Option<u64>,
    pub last_rebuilt_at: Option<DateTime<Utc>>,
}

impl VectorIndex {
    pub fn new(name: IndexName, description: impl Into<String>) -> Self {
        Self {
            name,
            description: description.into(),
            document_count: 0,
            vector_dimension: None,
            embedding_model: None,
            vector_artifact_path: None,
            metadata_artifact_path: None,
            revision: 0,
            built_revision: None,
            last_rebuilt_at: None,
        }
    }

    pub fn state(&self) -> IndexState {
        match self.built_revision {
            None => IndexState::Empty,
            Some(built) if built == self.revision => IndexState::Built,
            Some(_) => IndexState::Stale,
        }
    }
}

impl Entity for VectorIndex {
    type Id = IndexName;

    fn id(&self) -> &Self::Id {
        &self.name
    }
}

fn serialize_model<S: serde::Serializer>(
    model: &Option<EmbeddingModel>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match model {
        Some(model) => serializer.serialize_some(&model.to_string()),
        None => serializer.serialize_none(),
    }
}

/// What a successful rebuild writes back into the registry
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildRecord {
    pub document_count: usize,
    pub vector_dimension: usize,
    pub embedding_model: EmbeddingModel,
    pub built_revision: u64,
    pub vector_artifact_path: PathBuf,
    pub metadata_artifact_path: PathBuf,
    pub rebuilt_at: DateTime<Utc>,
}

/// A bounded slice of a parent document's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub parent: DocumentId,
    pub source: String,
    pub index: usize,
    pub total: usize,
    pub text: String,
}

impl Chunk {
    /// Identifier of the document stored for this chunk: `<parent>#<index>`
    pub fn document_id(&self) -> DomainResult<DocumentId> {
        DocumentId::new(format!("{}#{}", self.parent, self.index))
    }
}
