mod embedding_provider;

pub use embedding_provider::{EmbeddingError, EmbeddingProvider};
