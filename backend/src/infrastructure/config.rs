/// Runtime configuration: TOML file plus environment overrides
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::application::services::DEFAULT_BATCH_SIZE;
use crate::domain::EmbeddingModel;
use crate::infrastructure::embeddings::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};

pub const ENV_DATA_DIR: &str = "RAG_DATA_DIR";
pub const ENV_EMBEDDING_BACKEND: &str = "RAG_EMBEDDING_BACKEND";
pub const ENV_EMBEDDING_MODEL: &str = "RAG_EMBEDDING_MODEL";
pub const ENV_TOP_K: &str = "RAG_TOP_K";

const DATABASE_FILE: &str = "retrieval.sqlite3";
const ARTIFACT_DIR: &str = "vector_indices";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which embedding provider serves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    FastEmbed,
    /// Deterministic offline vectors; tests and air-gapped use only
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fastembed" | "fast_embed" => Ok(EmbeddingBackend::FastEmbed),
            "hashing" => Ok(EmbeddingBackend::Hashing),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_EMBEDDING_BACKEND.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

mod model_name {
    use crate::domain::EmbeddingModel;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(model: &EmbeddingModel, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&model.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EmbeddingModel, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

mod optional_model_name {
    use crate::domain::EmbeddingModel;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(model: &Option<EmbeddingModel>, s: S) -> Result<S::Ok, S::Error> {
        match model {
            Some(model) => s.serialize_some(&model.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<EmbeddingModel>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|name| name.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    #[serde(with = "model_name")]
    pub primary_model: EmbeddingModel,
    #[serde(with = "optional_model_name")]
    pub fallback_model: Option<EmbeddingModel>,
    /// Where downloaded model weights are cached
    pub cache_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub show_download_progress: bool,
    /// Vector size of the hashing backend
    pub hashing_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            backend: EmbeddingBackend::FastEmbed,
            primary_model: EmbeddingModel::ParaphraseMultilingualMiniLML12V2,
            fallback_model: Some(EmbeddingModel::AllMiniLML6V2),
            cache_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            show_download_progress: true,
            hashing_dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/retrieval.sqlite3`
    pub database_path: Option<PathBuf>,
    /// Defaults to `<data_dir>/vector_indices`
    pub artifact_dir: Option<PathBuf>,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            data_dir: PathBuf::from("data"),
            database_path: None,
            artifact_dir: None,
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            default_top_k: 5,
        }
    }
}

impl RetrievalConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        RetrievalConfig {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Apply `RAG_*` overrides from the process environment
    pub fn apply_env(self) -> ConfigResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `RAG_*` overrides from `lookup`
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup(ENV_EMBEDDING_BACKEND) {
            self.embedding.backend = backend.parse()?;
        }
        if let Some(model) = lookup(ENV_EMBEDDING_MODEL) {
            self.embedding.primary_model =
                model.parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_EMBEDDING_MODEL.to_string(),
                    value: model.clone(),
                })?;
        }
        if let Some(top_k) = lookup(ENV_TOP_K) {
            self.default_top_k = top_k
                .parse::<usize>()
                .ok()
                .filter(|k| *k > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_TOP_K.to_string(),
                    value: top_k.clone(),
                })?;
        }
        Ok(self)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DATABASE_FILE))
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(ARTIFACT_DIR))
    }
}
