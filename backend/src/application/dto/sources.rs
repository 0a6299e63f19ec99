use crate::domain::{
    DocumentId, DomainResult, IngestDocument, Metadata, KNOWLEDGE_BASE_SOURCE,
    PROMPT_TEMPLATE_SOURCE,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// An entry of the external knowledge base corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl KnowledgeEntry {
    pub fn document_id(&self) -> DomainResult<DocumentId> {
        DocumentId::new(format!("kb_{}", self.id))
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("name".to_string(), json!(self.name));
        metadata.insert(
            "description".to_string(),
            json!(self.description.as_deref().unwrap_or("")),
        );
        metadata.insert(
            "file_path".to_string(),
            json!(self.file_path.as_deref().unwrap_or("")),
        );
        metadata
    }

    /// The whole entry as one document
    pub fn to_document(&self) -> DomainResult<IngestDocument> {
        Ok(
            IngestDocument::new(self.document_id()?, self.text(), KNOWLEDGE_BASE_SOURCE)
                .with_metadata(self.metadata()),
        )
    }
}

/// A prompt template, searchable by name, description and content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
}

impl PromptTemplate {
    pub fn document_id(&self) -> DomainResult<DocumentId> {
        DocumentId::new(format!("prompt_{}", self.id))
    }

    /// Name, description and content joined by newlines
    pub fn search_text(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.name,
            self.description.as_deref().unwrap_or(""),
            self.content
        )
    }

    /// Templates are named `category.type`; a name without a dot has no type.
    pub fn category_and_type(&self) -> (&str, &str) {
        match self.name.split_once('.') {
            Some((category, kind)) => (category, kind),
            None => (self.name.as_str(), ""),
        }
    }

    pub fn to_document(&self) -> DomainResult<IngestDocument> {
        let (category, kind) = self.category_and_type();
        let mut metadata = Metadata::new();
        metadata.insert("name".to_string(), json!(self.name));
        metadata.insert("category".to_string(), json!(category));
        metadata.insert("type".to_string(), json!(kind));
        metadata.insert(
            "description".to_string(),
            json!(self.description.as_deref().unwrap_or("")),
        );
        metadata.insert("content".to_string(), json!(self.content));

        Ok(
            IngestDocument::new(self.document_id()?, self.search_text(), PROMPT_TEMPLATE_SOURCE)
                .with_metadata(metadata),
        )
    }
}
