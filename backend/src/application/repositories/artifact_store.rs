use crate::domain::{IndexArtifact, IndexName};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed artifact file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// The persisted pair disagrees with itself; positions cannot be trusted
    #[error("Inconsistent artifact for index '{index}': {reason}")]
    Consistency { index: String, reason: String },

    #[error("Artifact lock poisoned for index '{0}'")]
    LockPoisoned(String),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// The two files that make up one persisted index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

/// Storage for index artifacts.
///
/// Paths are a pure function of the index name. `write` replaces the pair
/// wholesale, and `load` never returns a mix of an old and a new half.
pub trait ArtifactStore: Send + Sync {
    fn paths(&self, index: &IndexName) -> ArtifactPaths;

    /// Atomically replaces the artifact of an index.
    fn write(&self, index: &IndexName, artifact: &IndexArtifact) -> ArtifactResult<ArtifactPaths>;

    /// Loads the artifact of an index, or `Ok(None)` if none was ever written.
    fn load(&self, index: &IndexName) -> ArtifactResult<Option<IndexArtifact>>;

    /// Removes the artifact of an index. Missing files are not an error.
    fn remove(&self, index: &IndexName) -> ArtifactResult<()>;
}
