/// FastEmbed service for local embedding generation
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::application::providers::{EmbeddingError, EmbeddingProvider};
use crate::application::services::DEFAULT_BATCH_SIZE;
use crate::domain::{EmbeddingModel, EmbeddingVector};

struct LoadedModel {
    model: TextEmbedding,
    kind: EmbeddingModel,
}

/// Embedding provider backed by a local ONNX model.
///
/// The model is loaded on first use and kept for the life of the service. If
/// the primary model cannot be loaded the fallback is tried; `load` reports which
/// one is serving so that indexes record the model that produced their vectors.
/// Encoding is serialized through the model lock.
pub struct FastEmbedService {
    primary: EmbeddingModel,
    fallback: Option<EmbeddingModel>,
    cache_dir: Option<PathBuf>,
    show_download_progress: bool,
    batch_size: usize,
    state: Mutex<Option<LoadedModel>>,
}

impl FastEmbedService {
    pub fn new(primary: EmbeddingModel) -> Self {
        FastEmbedService {
            primary,
            fallback: None,
            cache_dir: None,
            show_download_progress: true,
            batch_size: DEFAULT_BATCH_SIZE,
            state: Mutex::new(None),
        }
    }

    /// Multilingual primary model with the English MiniLM as fallback
    pub fn new_default() -> Self {
        Self::new(EmbeddingModel::ParaphraseMultilingualMiniLML12V2)
            .with_fallback(Some(EmbeddingModel::AllMiniLML6V2))
    }

    pub fn with_fallback(mut self, fallback: Option<EmbeddingModel>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_download_progress = show;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Model currently serving requests, if loaded
    pub fn loaded_model(&self) -> Option<EmbeddingModel> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.as_ref().map(|loaded| loaded.kind))
    }

    fn fastembed_model(kind: EmbeddingModel) -> Result<FastEmbedModel, EmbeddingError> {
        match kind {
            EmbeddingModel::ParaphraseMultilingualMiniLML12V2 => {
                Ok(FastEmbedModel::ParaphraseMLMiniLML12V2)
            }
            EmbeddingModel::AllMiniLML6V2 => Ok(FastEmbedModel::AllMiniLML6V2),
            EmbeddingModel::Hashing { .. } => Err(EmbeddingError::ModelUnavailable(format!(
                "{} is not a FastEmbed model",
                kind
            ))),
        }
    }

    fn try_init(&self, kind: EmbeddingModel) -> Result<TextEmbedding, EmbeddingError> {
        info!("Initializing FastEmbed model: {}", kind);

        let mut options = InitOptions::new(Self::fastembed_model(kind)?)
            .with_show_download_progress(self.show_download_progress);
        if let Some(dir) = &self.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::ModelUnavailable(format!("{}: {}", kind, e)))
    }

    /// Lock the model slot, loading a model into it if empty
    fn loaded(&self) -> Result<MutexGuard<'_, Option<LoadedModel>>, EmbeddingError> {
        let mut state = self.state.lock().map_err(|_| EmbeddingError::LockPoisoned)?;
        if state.is_some() {
            return Ok(state);
        }

        let loaded = match self.try_init(self.primary) {
            Ok(model) => LoadedModel {
                model,
                kind: self.primary,
            },
            Err(primary_error) => {
                let Some(fallback) = self.fallback else {
                    return Err(primary_error);
                };
                warn!(
                    "Failed to load {}, falling back to {}: {}",
                    self.primary, fallback, primary_error
                );
                LoadedModel {
                    model: self.try_init(fallback)?,
                    kind: fallback,
                }
            }
        };

        info!("FastEmbed model {} initialized successfully", loaded.kind);
        *state = Some(loaded);
        Ok(state)
    }
}

impl EmbeddingProvider for FastEmbedService {
    fn load(&self) -> Result<EmbeddingModel, EmbeddingError> {
        let state = self.loaded()?;
        state
            .as_ref()
            .map(|loaded| loaded.kind)
            .ok_or_else(|| EmbeddingError::ModelUnavailable("model slot is empty".to_string()))
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.loaded()?;
        let loaded = state
            .as_mut()
            .ok_or_else(|| EmbeddingError::ModelUnavailable("model slot is empty".to_string()))?;

        debug!(
            "Generating embeddings for batch of {} texts with {}",
            texts.len(),
            loaded.kind
        );
        let raw = loaded
            .model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::Encode {
                batch_size: texts.len(),
                reason: e.to_string(),
            })?;

        if raw.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: raw.len(),
            });
        }

        let expected = loaded.kind.dimension_count();
        raw.into_iter()
            .map(|values| {
                if values.len() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        model: loaded.kind,
                        expected,
                        actual: values.len(),
                    });
                }
                EmbeddingVector::new(values).map_err(|e| EmbeddingError::Encode {
                    batch_size: texts.len(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
