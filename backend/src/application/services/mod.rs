pub mod context_retriever;
pub mod import_service;
pub mod index_builder;

pub use context_retriever::{render_context, ContextRetriever, NO_CONTEXT_MESSAGE};
pub use import_service::{
    ImportError, ImportResult, ImportService, ImportSummary, COMBINED_INDEX, KNOWLEDGE_BASE_INDEX,
    PROMPT_TEMPLATE_INDEX,
};
pub use index_builder::{IndexBuilder, RebuildOutcome, RebuildStats, DEFAULT_BATCH_SIZE};
