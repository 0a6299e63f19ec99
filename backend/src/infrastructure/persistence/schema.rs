use rusqlite::{Connection, Result};

/// Initialize the SQLite database with the required schema.
/// This function is idempotent and can be safely called multiple times.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    // Enable foreign key constraints
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // Registry of named indexes
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vector_indexes (
            name TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            document_count INTEGER NOT NULL DEFAULT 0,
            vector_dimension INTEGER,
            embedding_model TEXT,
            vector_artifact_path TEXT,
            metadata_artifact_path TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            built_revision INTEGER,
            last_rebuilt_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Documents; the autoincrement id fixes insertion order for rebuilds
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            index_name TEXT NOT NULL,
            document_id TEXT NOT NULL,
            source TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (index_name, document_id),
            FOREIGN KEY (index_name) REFERENCES vector_indexes(name) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_index ON documents(index_name, id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
    }

    #[test]
    fn test_initialize_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_database(&conn).unwrap();

        assert_eq!(tables(&conn), vec!["documents", "vector_indexes"]);

        // Verify foreign keys are enabled
        let foreign_keys: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn test_initialize_database_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_database(&conn).unwrap();
        initialize_database(&conn).unwrap();
        initialize_database(&conn).unwrap();

        assert_eq!(tables(&conn).len(), 2);
    }

    #[test]
    fn test_documents_cascade_with_index() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_database(&conn).unwrap();

        conn.execute(
            "INSERT INTO vector_indexes (name, description, created_at) VALUES ('kb', '', 'now')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (index_name, document_id, source, text, metadata, created_at, updated_at)
             VALUES ('kb', 'doc', 'test', 'text', '{}', 'now', 'now')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM vector_indexes WHERE name = 'kb'", [])
            .unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
