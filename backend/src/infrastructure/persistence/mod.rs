mod file_artifact_store;
pub mod npy;
mod schema;
mod sqlite_document_store;

pub use file_artifact_store::FileArtifactStore;
pub use schema::initialize_database;
pub use sqlite_document_store::SqliteDocumentStore;
