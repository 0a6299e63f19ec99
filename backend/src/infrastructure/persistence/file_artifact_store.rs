use super::npy;
use crate::application::repositories::{ArtifactError, ArtifactPaths, ArtifactResult, ArtifactStore};
use crate::domain::{DocumentId, EmbeddingModel, IndexArtifact, IndexName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// JSON sidecar stored next to the vector file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sidecar {
    document_ids: Vec<String>,
    document_count: usize,
    vector_dimension: usize,
    embedding_model: String,
    built_at: DateTime<Utc>,
    /// Hex SHA-256 of the `.npy` file this sidecar belongs to
    vectors_sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Artifact store keeping each index in its own directory:
/// `<root>/<name>/<name>_vectors.npy` and `<root>/<name>/<name>_metadata.json`.
///
/// A write lands both files under temporary names and renames them into place
/// while holding the index's write lock; loads hold the read lock, so readers in
/// this process see either the old pair or the new one. The checksum in the
/// sidecar catches a pair torn by a writer in another process.
pub struct FileArtifactStore {
    root: PathBuf,
    locks: Mutex<HashMap<IndexName, Arc<RwLock<()>>>>,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileArtifactStore {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_dir(&self, index: &IndexName) -> PathBuf {
        self.root.join(index.as_str())
    }

    fn lock_for(&self, index: &IndexName) -> ArtifactResult<Arc<RwLock<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ArtifactError::LockPoisoned(index.to_string()))?;
        Ok(Arc::clone(locks.entry(index.clone()).or_default()))
    }

    /// Write `bytes` to a fresh temporary file in `dir` and flush it to disk
    fn write_temp(dir: &Path, stem: &str, bytes: &[u8]) -> ArtifactResult<PathBuf> {
        let path = dir.join(format!(".{}.{}.tmp", stem, Uuid::new_v4()));
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(path)
    }

    /// Keep the current vector file under a temporary name until the swap is done
    fn backup_vectors(dir: &Path, vectors: &Path) -> ArtifactResult<Option<PathBuf>> {
        if !vectors.exists() {
            return Ok(None);
        }
        let backup = dir.join(format!(".vectors.{}.bak", Uuid::new_v4()));
        if fs::hard_link(vectors, &backup).is_err() {
            fs::copy(vectors, &backup)?;
        }
        Ok(Some(backup))
    }

    fn read_pair(&self, index: &IndexName, paths: &ArtifactPaths) -> ArtifactResult<Option<IndexArtifact>> {
        let vectors_exist = paths.vectors.exists();
        let metadata_exist = paths.metadata.exists();
        match (vectors_exist, metadata_exist) {
            (false, false) => return Ok(None),
            (true, false) | (false, true) => {
                return Err(ArtifactError::Consistency {
                    index: index.to_string(),
                    reason: format!(
                        "only one of {} and {} exists",
                        paths.vectors.display(),
                        paths.metadata.display()
                    ),
                })
            }
            (true, true) => {}
        }

        let sidecar_bytes = fs::read(&paths.metadata)?;
        let vector_bytes = fs::read(&paths.vectors)?;

        let sidecar: Sidecar =
            serde_json::from_slice(&sidecar_bytes).map_err(|e| ArtifactError::Format {
                path: paths.metadata.clone(),
                reason: e.to_string(),
            })?;

        let consistency = |reason: String| ArtifactError::Consistency {
            index: index.to_string(),
            reason,
        };

        if sha256_hex(&vector_bytes) != sidecar.vectors_sha256 {
            return Err(consistency(
                "vector file does not match the checksum in the sidecar".to_string(),
            ));
        }

        let matrix = npy::decode(&vector_bytes).map_err(|e| ArtifactError::Format {
            path: paths.vectors.clone(),
            reason: e.to_string(),
        })?;

        if sidecar.document_ids.len() != sidecar.document_count
            || matrix.rows != sidecar.document_count
        {
            return Err(consistency(format!(
                "{} ids, document_count {}, {} vector rows",
                sidecar.document_ids.len(),
                sidecar.document_count,
                matrix.rows
            )));
        }
        if matrix.cols != sidecar.vector_dimension {
            return Err(consistency(format!(
                "sidecar dimension {}, vector file dimension {}",
                sidecar.vector_dimension, matrix.cols
            )));
        }

        let embedding_model: EmbeddingModel = sidecar
            .embedding_model
            .parse()
            .map_err(|e: crate::domain::DomainError| consistency(e.to_string()))?;
        let document_ids = sidecar
            .document_ids
            .into_iter()
            .map(DocumentId::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| consistency(e.to_string()))?;

        IndexArtifact::from_parts(
            document_ids,
            matrix.cols,
            matrix.data,
            embedding_model,
            sidecar.built_at,
        )
        .map(Some)
        .map_err(|e| consistency(e.to_string()))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn paths(&self, index: &IndexName) -> ArtifactPaths {
        let dir = self.index_dir(index);
        ArtifactPaths {
            vectors: dir.join(format!("{}_vectors.npy", index)),
            metadata: dir.join(format!("{}_metadata.json", index)),
        }
    }

    fn write(&self, index: &IndexName, artifact: &IndexArtifact) -> ArtifactResult<ArtifactPaths> {
        let paths = self.paths(index);
        let dir = self.index_dir(index);
        fs::create_dir_all(&dir)?;

        let vector_bytes = npy::encode(artifact.len(), artifact.dimension(), artifact.vectors());
        let sidecar = Sidecar {
            document_ids: artifact
                .document_ids()
                .iter()
                .map(|id| id.to_string())
                .collect(),
            document_count: artifact.len(),
            vector_dimension: artifact.dimension(),
            embedding_model: artifact.embedding_model().to_string(),
            built_at: artifact.built_at(),
            vectors_sha256: sha256_hex(&vector_bytes),
        };
        let sidecar_bytes = serde_json::to_vec_pretty(&sidecar).map_err(|e| ArtifactError::Format {
            path: paths.metadata.clone(),
            reason: e.to_string(),
        })?;

        let vectors_tmp = Self::write_temp(&dir, "vectors", &vector_bytes)?;
        let metadata_tmp = match Self::write_temp(&dir, "metadata", &sidecar_bytes) {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&vectors_tmp);
                return Err(e);
            }
        };

        let lock = self.lock_for(index)?;
        let _guard = lock
            .write()
            .map_err(|_| ArtifactError::LockPoisoned(index.to_string()))?;

        let backup = match Self::backup_vectors(&dir, &paths.vectors) {
            Ok(backup) => backup,
            Err(e) => {
                let _ = fs::remove_file(&vectors_tmp);
                let _ = fs::remove_file(&metadata_tmp);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&vectors_tmp, &paths.vectors) {
            let _ = fs::remove_file(&vectors_tmp);
            let _ = fs::remove_file(&metadata_tmp);
            if let Some(backup) = &backup {
                let _ = fs::remove_file(backup);
            }
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&metadata_tmp, &paths.metadata) {
            let _ = fs::remove_file(&metadata_tmp);
            // the old sidecar is still in place, so its vectors go back too
            let restored = match &backup {
                Some(backup) => fs::rename(backup, &paths.vectors),
                None => fs::remove_file(&paths.vectors),
            };
            if let Err(restore) = restored {
                warn!(
                    "Could not restore previous vectors of '{}': {}",
                    index, restore
                );
            }
            return Err(e.into());
        }

        if let Some(backup) = backup {
            let _ = fs::remove_file(backup);
        }

        info!(
            "Wrote artifact for '{}': {} x {} to {}",
            index,
            artifact.len(),
            artifact.dimension(),
            dir.display()
        );
        Ok(paths)
    }

    fn load(&self, index: &IndexName) -> ArtifactResult<Option<IndexArtifact>> {
        let paths = self.paths(index);
        let lock = self.lock_for(index)?;
        let _guard = lock
            .read()
            .map_err(|_| ArtifactError::LockPoisoned(index.to_string()))?;

        match self.read_pair(index, &paths) {
            // a writer in another process may have been between its two renames
            Err(ArtifactError::Consistency { reason, .. }) if reason.contains("checksum") => {
                warn!("Artifact for '{}' failed its checksum, reading again", index);
                self.read_pair(index, &paths)
            }
            other => {
                if let Ok(Some(artifact)) = &other {
                    debug!("Loaded artifact for '{}' with {} rows", index, artifact.len());
                }
                other
            }
        }
    }

    fn remove(&self, index: &IndexName) -> ArtifactResult<()> {
        let paths = self.paths(index);
        let lock = self.lock_for(index)?;
        let _guard = lock
            .write()
            .map_err(|_| ArtifactError::LockPoisoned(index.to_string()))?;

        for path in [&paths.vectors, &paths.metadata] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        // only succeeds once the directory is empty
        let _ = fs::remove_dir(self.index_dir(index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn name() -> IndexName {
        IndexName::new("kb_test").unwrap()
    }

    fn artifact(rows: usize) -> IndexArtifact {
        let ids = (0..rows)
            .map(|i| DocumentId::new(format!("doc{}", i)).unwrap())
            .collect();
        let vectors = (0..rows * 3).map(|i| i as f32 * 0.5).collect();
        IndexArtifact::from_parts(
            ids,
            3,
            vectors,
            EmbeddingModel::Hashing { dimension: 3 },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_paths_are_derived_from_name() {
        let store = FileArtifactStore::new("/data/vector_indices");
        let paths = store.paths(&name());
        assert_eq!(
            paths.vectors,
            PathBuf::from("/data/vector_indices/kb_test/kb_test_vectors.npy")
        );
        assert_eq!(
            paths.metadata,
            PathBuf::from("/data/vector_indices/kb_test/kb_test_metadata.json")
        );
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        assert!(store.load(&name()).unwrap().is_none());
    }

    #[test]
    fn test_written_artifact_loads_back() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let original = artifact(4);

        let paths = store.write(&name(), &original).unwrap();
        assert!(paths.vectors.exists());
        assert!(paths.metadata.exists());

        let loaded = store.load(&name()).unwrap().unwrap();
        assert_eq!(loaded, original);

        // no temporary files are left behind
        let entries: Vec<_> = fs::read_dir(dir.path().join("kb_test"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_sidecar_contents() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.write(&name(), &artifact(2)).unwrap();

        let sidecar: serde_json::Value =
            serde_json::from_slice(&fs::read(&paths.metadata).unwrap()).unwrap();
        assert_eq!(sidecar["document_ids"], serde_json::json!(["doc0", "doc1"]));
        assert_eq!(sidecar["document_count"], 2);
        assert_eq!(sidecar["vector_dimension"], 3);
        assert_eq!(sidecar["embedding_model"], "hashing-3");
        assert_eq!(sidecar["vectors_sha256"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_rewrite_replaces_previous_pair() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.write(&name(), &artifact(5)).unwrap();
        store.write(&name(), &artifact(2)).unwrap();
        assert_eq!(store.load(&name()).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_sidecar_rename_restores_previous_vectors() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.write(&name(), &artifact(2)).unwrap();
        let old_vectors = fs::read(&paths.vectors).unwrap();
        let old_metadata = fs::read(&paths.metadata).unwrap();

        // a non-empty directory where the sidecar goes makes its rename fail
        fs::remove_file(&paths.metadata).unwrap();
        fs::create_dir(&paths.metadata).unwrap();
        fs::write(paths.metadata.join("occupied"), b"x").unwrap();

        assert!(store.write(&name(), &artifact(5)).is_err());
        assert_eq!(fs::read(&paths.vectors).unwrap(), old_vectors);

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("kb_test"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "left behind: {leftovers:?}");

        fs::remove_dir_all(&paths.metadata).unwrap();
        fs::write(&paths.metadata, old_metadata).unwrap();
        assert_eq!(store.load(&name()).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_first_write_leaves_no_vectors() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.paths(&name());
        fs::create_dir_all(paths.metadata.join("occupied")).unwrap();

        assert!(store.write(&name(), &artifact(3)).is_err());
        assert!(!paths.vectors.exists());
    }

    #[test]
    fn test_half_missing_pair_is_inconsistent() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.write(&name(), &artifact(2)).unwrap();
        fs::remove_file(&paths.metadata).unwrap();

        assert!(matches!(
            store.load(&name()),
            Err(ArtifactError::Consistency { .. })
        ));
    }

    #[test]
    fn test_mismatched_vectors_are_inconsistent() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.write(&name(), &artifact(2)).unwrap();

        // a vector file from a different build
        fs::write(&paths.vectors, npy::encode(3, 3, &[0.0; 9])).unwrap();
        assert!(matches!(
            store.load(&name()),
            Err(ArtifactError::Consistency { .. })
        ));
    }

    #[test]
    fn test_count_mismatch_is_inconsistent() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.write(&name(), &artifact(2)).unwrap();

        let mut sidecar: Sidecar =
            serde_json::from_slice(&fs::read(&paths.metadata).unwrap()).unwrap();
        sidecar.document_ids.push("extra".to_string());
        sidecar.document_count = 3;
        fs::write(&paths.metadata, serde_json::to_vec(&sidecar).unwrap()).unwrap();

        assert!(matches!(
            store.load(&name()),
            Err(ArtifactError::Consistency { .. })
        ));
    }

    #[test]
    fn test_malformed_sidecar_is_format_error() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let paths = store.write(&name(), &artifact(1)).unwrap();
        fs::write(&paths.metadata, b"{not json").unwrap();

        assert!(matches!(store.load(&name()), Err(ArtifactError::Format { .. })));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.write(&name(), &artifact(1)).unwrap();

        store.remove(&name()).unwrap();
        assert!(store.load(&name()).unwrap().is_none());
        assert!(!dir.path().join("kb_test").exists());

        // removing again is fine
        store.remove(&name()).unwrap();
    }

    #[test]
    fn test_readers_never_see_a_torn_pair() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        store.write(&name(), &artifact(1)).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for rows in 1..30 {
                    store.write(&name(), &artifact(rows)).unwrap();
                }
            })
        };
        for _ in 0..200 {
            let loaded = store.load(&name()).unwrap().unwrap();
            assert_eq!(loaded.document_ids().len(), loaded.len());
        }
        writer.join().unwrap();
    }
}
