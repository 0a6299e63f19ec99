use crate::domain::{distance_to_score, Document, DocumentId, IndexName, Metadata};
use serde::Serialize;

/// Similarity query parameters
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Index to query
    pub index: IndexName,
    /// The query text
    pub query: String,
    /// Maximum number of hits, at least 1
    pub top_k: usize,
}

impl SearchRequest {
    pub fn new(index: IndexName, query: impl Into<String>) -> Self {
        Self {
            index,
            query: query.into(),
            top_k: 5,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// A document matched by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub source: String,
    pub text: String,
    pub metadata: Metadata,
    /// Euclidean distance between query and document vectors
    pub distance: f32,
    /// `1 / (1 + distance)`; higher is more similar
    pub score: f32,
}

impl SearchHit {
    pub fn from_document(document: Document, distance: f32) -> Self {
        Self {
            document_id: document.document_id().clone(),
            source: document.source().to_string(),
            text: document.text().to_string(),
            metadata: document.metadata().clone(),
            distance,
            score: distance_to_score(distance),
        }
    }
}

/// A knowledge base hit in the shape chat callers consume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeHit {
    /// Source id with the `kb_` prefix stripped
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub similarity: f32,
}

impl From<SearchHit> for KnowledgeHit {
    fn from(hit: SearchHit) -> Self {
        let raw = hit.document_id.as_str();
        let id = raw.strip_prefix("kb_").unwrap_or(raw).to_string();
        Self {
            id,
            content: hit.text,
            metadata: hit.metadata,
            similarity: hit.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, distance: f32) -> SearchHit {
        SearchHit {
            document_id: DocumentId::new(id).unwrap(),
            source: "knowledge_base".to_string(),
            text: "content".to_string(),
            metadata: Metadata::new(),
            distance,
            score: distance_to_score(distance),
        }
    }

    #[test]
    fn test_knowledge_hit_strips_prefix() {
        let knowledge: KnowledgeHit = hit("kb_42", 1.0).into();
        assert_eq!(knowledge.id, "42");
        assert_eq!(knowledge.similarity, 0.5);

        let other: KnowledgeHit = hit("prompt_3", 0.0).into();
        assert_eq!(other.id, "prompt_3");
    }

    #[test]
    fn test_search_request_defaults() {
        let request = SearchRequest::new(IndexName::new("knowledge_base").unwrap(), "q");
        assert_eq!(request.top_k, 5);
        assert_eq!(request.with_top_k(2).top_k, 2);
    }
}
