mod search;
mod sources;

pub use search::{KnowledgeHit, SearchHit, SearchRequest};
pub use sources::{KnowledgeEntry, PromptTemplate};
