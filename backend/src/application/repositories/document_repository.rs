use super::StoreResult;
use crate::domain::{Document, DocumentId, IndexName, IngestDocument};

/// Repository trait for the documents of every index.
///
/// Documents are keyed by `(index_name, document_id)`. Implementations are
/// internally synchronized so that one store can be shared between the index
/// builder, the searcher and importers running on different threads.
pub trait DocumentRepository: Send + Sync {
    /// Inserts or updates a document.
    ///
    /// Returns the stored document and `true` if it was newly created. A new
    /// document bumps the owning index's `document_count`; an update only changes
    /// text, source, metadata and timestamp. An upsert whose content equals the
    /// stored row leaves the row untouched. Fails with `IndexNotFound` if the
    /// index is not registered.
    fn upsert(&self, index: &IndexName, document: IngestDocument) -> StoreResult<(Document, bool)>;

    /// Lists all documents of an index in insertion order (by internal id).
    ///
    /// The index builder relies on this order to keep artifact rows and ids aligned.
    fn list_for_index(&self, index: &IndexName) -> StoreResult<Vec<Document>>;

    /// Finds a document by its key.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    fn find_document(&self, index: &IndexName, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Deletes a document by its key.
    ///
    /// Returns `Ok(true)` if the document was deleted, `Ok(false)` if it was not found.
    fn delete_document(&self, index: &IndexName, id: &DocumentId) -> StoreResult<bool>;

    /// Returns the live number of documents stored for an index.
    fn count_for_index(&self, index: &IndexName) -> StoreResult<usize>;

    /// Looks up a single document, treating absence as an error.
    fn get_document(&self, index: &IndexName, id: &DocumentId) -> StoreResult<Document> {
        self.find_document(index, id)?
            .ok_or_else(|| super::StoreError::DocumentNotFound {
                index: index.to_string(),
                document_id: id.to_string(),
            })
    }
}
