pub mod discovery;
pub mod sources;

pub use discovery::discover_markdown_files;
pub use sources::{
    load_knowledge_entries, load_markdown_knowledge, load_prompt_templates, SourceError,
    SourceResult,
};
