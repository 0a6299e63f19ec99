use super::StoreResult;
use crate::domain::{IndexName, RebuildRecord, VectorIndex};

/// Registry of named vector indexes
pub trait IndexRegistry: Send + Sync {
    /// Returns the index with this name, creating it with `description` if absent.
    fn ensure_index(&self, name: &IndexName, description: &str) -> StoreResult<VectorIndex>;

    /// Finds an index by name.
    fn get_index(&self, name: &IndexName) -> StoreResult<Option<VectorIndex>>;

    /// Returns all registered indexes ordered by name.
    fn list_indexes(&self) -> StoreResult<Vec<VectorIndex>>;

    /// Stores the outcome of a successful rebuild and returns the updated record.
    fn record_rebuild(&self, name: &IndexName, record: RebuildRecord) -> StoreResult<VectorIndex>;

    /// Deletes an index together with all of its documents.
    ///
    /// Returns `Ok(false)` if no such index was registered.
    fn delete_index(&self, name: &IndexName) -> StoreResult<bool>;
}
