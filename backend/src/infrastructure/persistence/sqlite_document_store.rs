use crate::application::repositories::{
    DocumentRepository, IndexRegistry, StoreError, StoreResult,
};
use crate::domain::{
    Document, DocumentId, DomainError, EmbeddingModel, IndexName, IngestDocument, Metadata,
    RebuildRecord, VectorIndex,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const DOCUMENT_COLUMNS: &str =
    "id, index_name, document_id, source, text, metadata, updated_at";

const INDEX_COLUMNS: &str = "name, description, document_count, vector_dimension, embedding_model,
     vector_artifact_path, metadata_artifact_path, revision, built_revision, last_rebuilt_at";

/// Raw `documents` row before validation
struct DocumentRow {
    id: i64,
    index_name: String,
    document_id: String,
    source: String,
    text: String,
    metadata: String,
    updated_at: String,
}

impl DocumentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DocumentRow {
            id: row.get(0)?,
            index_name: row.get(1)?,
            document_id: row.get(2)?,
            source: row.get(3)?,
            text: row.get(4)?,
            metadata: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_document(self) -> StoreResult<Document> {
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;
        Ok(Document::new(
            self.id,
            IndexName::new(self.index_name)?,
            DocumentId::new(self.document_id)?,
            self.source,
            self.text,
            metadata,
            parse_timestamp(&self.updated_at)?,
        ))
    }
}

/// Raw `vector_indexes` row before validation
struct IndexRow {
    name: String,
    description: String,
    document_count: i64,
    vector_dimension: Option<i64>,
    embedding_model: Option<String>,
    vector_artifact_path: Option<String>,
    metadata_artifact_path: Option<String>,
    revision: i64,
    built_revision: Option<i64>,
    last_rebuilt_at: Option<String>,
}

impl IndexRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(IndexRow {
            name: row.get(0)?,
            description: row.get(1)?,
            document_count: row.get(2)?,
            vector_dimension: row.get(3)?,
            embedding_model: row.get(4)?,
            vector_artifact_path: row.get(5)?,
            metadata_artifact_path: row.get(6)?,
            revision: row.get(7)?,
            built_revision: row.get(8)?,
            last_rebuilt_at: row.get(9)?,
        })
    }

    fn into_index(self) -> StoreResult<VectorIndex> {
        let embedding_model = self
            .embedding_model
            .as_deref()
            .map(str::parse::<EmbeddingModel>)
            .transpose()?;
        let last_rebuilt_at = self
            .last_rebuilt_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(VectorIndex {
            name: IndexName::new(self.name)?,
            description: self.description,
            document_count: self.document_count.max(0) as usize,
            vector_dimension: self.vector_dimension.map(|d| d.max(0) as usize),
            embedding_model,
            vector_artifact_path: self.vector_artifact_path.map(PathBuf::from),
            metadata_artifact_path: self.metadata_artifact_path.map(PathBuf::from),
            revision: self.revision.max(0) as u64,
            built_revision: self.built_revision.map(|r| r.max(0) as u64),
            last_rebuilt_at,
        })
    }
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::InvalidRow(DomainError::InvalidValue(format!(
                "Invalid timestamp '{}': {}",
                value, e
            )))
        })
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// SQLite-based document store and index registry.
///
/// One connection guarded by a mutex; every trait method runs under the lock,
/// multi-statement writes inside a transaction.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Create a new store with the given connection
    pub fn new(conn: Connection) -> StoreResult<Self> {
        super::schema::initialize_database(&conn)?;
        Ok(SqliteDocumentStore {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new in-memory store (useful for testing)
    pub fn new_in_memory() -> StoreResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Create a new file-based store, creating parent directories as needed
    pub fn new_with_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Opening document store at {}", path.display());
        Self::new(Connection::open(path)?)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn require_index(tx: &Transaction<'_>, index: &IndexName) -> StoreResult<()> {
        let exists = tx
            .query_row(
                "SELECT 1 FROM vector_indexes WHERE name = ?1",
                params![index.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        exists.ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    fn load_document(
        conn: &Connection,
        index: &IndexName,
        id: &DocumentId,
    ) -> StoreResult<Option<Document>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM documents WHERE index_name = ?1 AND document_id = ?2",
                    DOCUMENT_COLUMNS
                ),
                params![index.as_str(), id.as_str()],
                DocumentRow::read,
            )
            .optional()?;
        row.map(DocumentRow::into_document).transpose()
    }

    fn load_index(conn: &Connection, name: &IndexName) -> StoreResult<Option<VectorIndex>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM vector_indexes WHERE name = ?1", INDEX_COLUMNS),
                params![name.as_str()],
                IndexRow::read,
            )
            .optional()?;
        row.map(IndexRow::into_index).transpose()
    }

    fn bump_revision(tx: &Transaction<'_>, index: &IndexName, new_documents: i64) -> StoreResult<()> {
        tx.execute(
            "UPDATE vector_indexes
             SET revision = revision + 1, document_count = document_count + ?2
             WHERE name = ?1",
            params![index.as_str(), new_documents],
        )?;
        Ok(())
    }
}

impl DocumentRepository for SqliteDocumentStore {
    fn upsert(&self, index: &IndexName, document: IngestDocument) -> StoreResult<(Document, bool)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::require_index(&tx, index)?;

        let existing = Self::load_document(&tx, index, &document.document_id)?;
        let created = match &existing {
            Some(stored) if !stored.differs_from(&document) => {
                debug!("Document '{}' unchanged in '{}'", document.document_id, index);
                return Ok((stored.clone(), false));
            }
            Some(_) => {
                tx.execute(
                    "UPDATE documents SET source = ?3, text = ?4, metadata = ?5, updated_at = ?6
                     WHERE index_name = ?1 AND document_id = ?2",
                    params![
                        index.as_str(),
                        document.document_id.as_str(),
                        document.source,
                        document.text,
                        serde_json::to_string(&document.metadata)?,
                        now(),
                    ],
                )?;
                Self::bump_revision(&tx, index, 0)?;
                false
            }
            None => {
                let timestamp = now();
                tx.execute(
                    "INSERT INTO documents
                     (index_name, document_id, source, text, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        index.as_str(),
                        document.document_id.as_str(),
                        document.source,
                        document.text,
                        serde_json::to_string(&document.metadata)?,
                        timestamp,
                    ],
                )?;
                Self::bump_revision(&tx, index, 1)?;
                true
            }
        };

        let stored = Self::load_document(&tx, index, &document.document_id)?.ok_or_else(|| {
            StoreError::DocumentNotFound {
                index: index.to_string(),
                document_id: document.document_id.to_string(),
            }
        })?;
        tx.commit()?;
        Ok((stored, created))
    }

    fn list_for_index(&self, index: &IndexName) -> StoreResult<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE index_name = ?1 ORDER BY id",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![index.as_str()], DocumentRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    fn find_document(&self, index: &IndexName, id: &DocumentId) -> StoreResult<Option<Document>> {
        let conn = self.lock()?;
        Self::load_document(&conn, index, id)
    }

    fn delete_document(&self, index: &IndexName, id: &DocumentId) -> StoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM documents WHERE index_name = ?1 AND document_id = ?2",
            params![index.as_str(), id.as_str()],
        )?;
        if deleted > 0 {
            Self::bump_revision(&tx, index, 0)?;
        }
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn count_for_index(&self, index: &IndexName) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE index_name = ?1",
            params![index.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}

impl IndexRegistry for SqliteDocumentStore {
    fn ensure_index(&self, name: &IndexName, description: &str) -> StoreResult<VectorIndex> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO vector_indexes (name, description, created_at)
             VALUES (?1, ?2, ?3)",
            params![name.as_str(), description, now()],
        )?;
        Self::load_index(&conn, name)?.ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }

    fn get_index(&self, name: &IndexName) -> StoreResult<Option<VectorIndex>> {
        let conn = self.lock()?;
        Self::load_index(&conn, name)
    }

    fn list_indexes(&self) -> StoreResult<Vec<VectorIndex>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM vector_indexes ORDER BY name",
            INDEX_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], IndexRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(IndexRow::into_index).collect()
    }

    fn record_rebuild(&self, name: &IndexName, record: RebuildRecord) -> StoreResult<VectorIndex> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE vector_indexes
             SET document_count = ?2, vector_dimension = ?3, embedding_model = ?4,
                 vector_artifact_path = ?5, metadata_artifact_path = ?6,
                 built_revision = ?7, last_rebuilt_at = ?8
             WHERE name = ?1",
            params![
                name.as_str(),
                record.document_count as i64,
                record.vector_dimension as i64,
                record.embedding_model.to_string(),
                record.vector_artifact_path.to_string_lossy(),
                record.metadata_artifact_path.to_string_lossy(),
                record.built_revision as i64,
                record.rebuilt_at.to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::IndexNotFound(name.to_string()));
        }
        Self::load_index(&conn, name)?.ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }

    fn delete_index(&self, name: &IndexName) -> StoreResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM vector_indexes WHERE name = ?1",
            params![name.as_str()],
        )?;
        Ok(deleted > 0)
    }
}
