/// Value objects for the domain layer
use super::base::{DomainError, DomainResult, ValueObject};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Longest accepted index name or document id
const MAX_NAME_LENGTH: usize = 100;

/// Free-form document metadata (display name, description, origin, ...)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Name of a vector index.
///
/// Artifact file paths are derived from the name, so only alphanumeric characters,
/// `_` and `-` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexName(String);

impl IndexName {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidValue(
                "IndexName cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(DomainError::InvalidValue(format!(
                "IndexName cannot exceed {} characters",
                MAX_NAME_LENGTH
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::InvalidValue(format!(
                "IndexName '{}' may only contain letters, digits, '_' and '-'",
                name
            )));
        }
        Ok(IndexName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for IndexName {}

impl Serialize for IndexName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-chosen identifier of a document, unique within one index (e.g. `kb_12`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "DocumentId cannot be empty".to_string(),
            ));
        }
        if id.chars().count() > MAX_NAME_LENGTH {
            return Err(DomainError::InvalidValue(format!(
                "DocumentId cannot exceed {} characters",
                MAX_NAME_LENGTH
            )));
        }
        Ok(DocumentId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for DocumentId {}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedding model that produced a set of vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingModel {
    /// paraphrase-multilingual-MiniLM-L12-v2 (384 dimensions, Chinese and English)
    ParaphraseMultilingualMiniLML12V2,
    /// all-MiniLM-L6-v2 (384 dimensions, English)
    AllMiniLML6V2,
    /// Deterministic feature-hashing embedder for offline and test use
    Hashing { dimension: usize },
}

impl EmbeddingModel {
    /// Get the dimension count for this model
    pub fn dimension_count(&self) -> usize {
        match self {
            EmbeddingModel::ParaphraseMultilingualMiniLML12V2 => 384,
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::Hashing { dimension } => *dimension,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, EmbeddingModel::Hashing { .. })
    }
}

impl ValueObject for EmbeddingModel {}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingModel::ParaphraseMultilingualMiniLML12V2 => {
                write!(f, "paraphrase-multilingual-MiniLM-L12-v2")
            }
            EmbeddingModel::AllMiniLML6V2 => write!(f, "all-MiniLM-L6-v2"),
            EmbeddingModel::Hashing { dimension } => write!(f, "hashing-{}", dimension),
        }
    }
}

impl FromStr for EmbeddingModel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "paraphrase-multilingual-MiniLM-L12-v2" => {
                Ok(EmbeddingModel::ParaphraseMultilingualMiniLML12V2)
            }
            "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            other => {
                let dimension = other
                    .strip_prefix("hashing-")
                    .and_then(|d| d.parse::<usize>().ok())
                    .filter(|d| *d > 0)
                    .ok_or_else(|| {
                        DomainError::InvalidValue(format!("Unknown embedding model: {}", other))
                    })?;
                Ok(EmbeddingModel::Hashing { dimension })
            }
        }
    }
}

/// A dense embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    dimensions: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(dimensions: Vec<f32>) -> DomainResult<Self> {
        if dimensions.is_empty() {
            return Err(DomainError::InvalidValue(
                "Embedding vector cannot be empty".to_string(),
            ));
        }
        if dimensions.iter().any(|v| !v.is_finite()) {
            return Err(DomainError::InvalidValue(
                "Embedding vector contains non-finite values".to_string(),
            ));
        }
        Ok(EmbeddingVector { dimensions })
    }

    pub fn dimensions(&self) -> &[f32] {
        &self.dimensions
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.dimensions
    }

    /// Euclidean (L2) distance to a raw row of the same dimension
    pub fn euclidean_distance(&self, row: &[f32]) -> DomainResult<f32> {
        if row.len() != self.dimensions.len() {
            return Err(DomainError::InvalidValue(format!(
                "Dimension mismatch: {} vs {}",
                self.dimensions.len(),
                row.len()
            )));
        }

        let sum: f32 = self
            .dimensions
            .iter()
            .zip(row)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(sum.sqrt())
    }
}

/// Convert a distance into a similarity score in `(0, 1]`
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}
