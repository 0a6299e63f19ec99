pub mod config;
pub mod embeddings;
pub mod engine;
pub mod file_system;
pub mod persistence;

pub use config::{ChunkingConfig, ConfigError, EmbeddingBackend, EmbeddingConfig, RetrievalConfig};
pub use engine::RetrievalEngine;
