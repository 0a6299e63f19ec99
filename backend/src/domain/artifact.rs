/// The persisted result of a rebuild: `N` document ids aligned with an `N x D` matrix
use super::base::{DomainError, DomainResult};
use super::value_objects::{DocumentId, EmbeddingModel, EmbeddingVector};
use chrono::{DateTime, Utc};

/// Row `i` of the matrix is the embedding of `document_ids[i]`.
///
/// Both constructors reject any disagreement between the id count, the row count
/// and the dimension, so a value of this type is always internally consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArtifact {
    document_ids: Vec<DocumentId>,
    dimension: usize,
    vectors: Vec<f32>,
    embedding_model: EmbeddingModel,
    built_at: DateTime<Utc>,
}

impl IndexArtifact {
    /// Assemble an artifact from freshly encoded vectors
    pub fn from_embeddings(
        document_ids: Vec<DocumentId>,
        embeddings: Vec<EmbeddingVector>,
        embedding_model: EmbeddingModel,
    ) -> DomainResult<Self> {
        if document_ids.len() != embeddings.len() {
            return Err(DomainError::InvariantViolation(format!(
                "{} document ids for {} vectors",
                document_ids.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings
            .first()
            .map(EmbeddingVector::dimension_count)
            .ok_or_else(|| {
                DomainError::InvariantViolation("artifact must hold at least one vector".to_string())
            })?;

        let mut vectors = Vec::with_capacity(dimension * embeddings.len());
        for (position, embedding) in embeddings.into_iter().enumerate() {
            if embedding.dimension_count() != dimension {
                return Err(DomainError::InvariantViolation(format!(
                    "vector {} has dimension {}, expected {}",
                    position,
                    embedding.dimension_count(),
                    dimension
                )));
            }
            vectors.extend(embedding.into_inner());
        }

        Ok(Self {
            document_ids,
            dimension,
            vectors,
            embedding_model,
            built_at: Utc::now(),
        })
    }

    /// Reassemble an artifact from its persisted parts
    pub fn from_parts(
        document_ids: Vec<DocumentId>,
        dimension: usize,
        vectors: Vec<f32>,
        embedding_model: EmbeddingModel,
        built_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if dimension == 0 {
            return Err(DomainError::InvariantViolation(
                "vector dimension must be positive".to_string(),
            ));
        }
        if vectors.len() != document_ids.len() * dimension {
            return Err(DomainError::InvariantViolation(format!(
                "{} values cannot hold {} rows of dimension {}",
                vectors.len(),
                document_ids.len(),
                dimension
            )));
        }

        Ok(Self {
            document_ids,
            dimension,
            vectors,
            embedding_model,
            built_at,
        })
    }

    pub fn len(&self) -> usize {
        self.document_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn document_ids(&self) -> &[DocumentId] {
        &self.document_ids
    }

    pub fn embedding_model(&self) -> EmbeddingModel {
        self.embedding_model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Row-major matrix values
    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Iterate `(position, document_id, row)` in stored order
    pub fn rows(&self) -> impl Iterator<Item = (usize, &DocumentId, &[f32])> {
        self.document_ids
            .iter()
            .zip(self.vectors.chunks_exact(self.dimension))
            .enumerate()
            .map(|(position, (id, row))| (position, id, row))
    }
}
