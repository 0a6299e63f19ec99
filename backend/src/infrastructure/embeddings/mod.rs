/// Embeddings infrastructure for semantic search
mod chunker;
mod fastembed_service;
mod hashing_embedder;

pub use chunker::{chunk_text, Chunker, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
pub use fastembed_service::FastEmbedService;
pub use hashing_embedder::HashingEmbedder;
