/// Loaders for the external corpora: JSON exports and markdown directories
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::discovery::discover_markdown_files;
use crate::application::dto::{KnowledgeEntry, PromptTemplate};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type SourceResult<T> = Result<T, SourceError>;

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> SourceResult<Vec<T>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Knowledge base entries from a JSON array
pub async fn load_knowledge_entries(path: &Path) -> SourceResult<Vec<KnowledgeEntry>> {
    let entries: Vec<KnowledgeEntry> = read_json(path).await?;
    debug!("Loaded {} knowledge entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Prompt templates from a JSON array
pub async fn load_prompt_templates(path: &Path) -> SourceResult<Vec<PromptTemplate>> {
    let templates: Vec<PromptTemplate> = read_json(path).await?;
    debug!("Loaded {} prompt templates from {}", templates.len(), path.display());
    Ok(templates)
}

/// One knowledge entry per markdown file under `dir`.
///
/// The file stem is both id and name. Unreadable files are logged and skipped.
pub async fn load_markdown_knowledge(dir: &Path) -> SourceResult<Vec<KnowledgeEntry>> {
    let files = discover_markdown_files(dir)
        .await
        .map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping {}: file name is not valid UTF-8", file.display());
            continue;
        };

        match tokio::fs::read_to_string(&file).await {
            Ok(content) => entries.push(KnowledgeEntry {
                id: name.to_string(),
                name: name.to_string(),
                description: Some(format!("{} knowledge base document", name)),
                content: Some(content),
                file_path: Some(file.to_string_lossy().to_string()),
            }),
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }

    debug!("Loaded {} markdown documents from {}", entries.len(), dir.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_knowledge_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        fs::write(
            &path,
            r#"[{"id": "1", "name": "Beijing", "content": "北京是中国的首都"},
                {"id": "2", "name": "Empty"}]"#,
        )
        .unwrap();

        let entries = load_knowledge_entries(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text(), "北京是中国的首都");
        assert_eq!(entries[1].text(), "");
    }

    #[tokio::test]
    async fn test_load_prompt_templates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        fs::write(
            &path,
            r#"[{"id": "1", "name": "design.review", "content": "Review it"}]"#,
        )
        .unwrap();

        let templates = load_prompt_templates(&path).await.unwrap();
        assert_eq!(templates[0].category_and_type(), ("design", "review"));
    }

    #[tokio::test]
    async fn test_errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{").unwrap();

        let err = load_knowledge_entries(&path).await.unwrap_err();
        assert!(matches!(err, SourceError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));

        let missing = load_prompt_templates(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(missing, SourceError::Io { .. }));
    }

    #[tokio::test]
    async fn test_load_markdown_knowledge() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("shanghai.md"), "# 上海\n经济中心").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let entries = load_markdown_knowledge(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "shanghai");
        assert_eq!(entries[0].name, "shanghai");
        assert_eq!(
            entries[0].description.as_deref(),
            Some("shanghai knowledge base document")
        );
        assert_eq!(entries[0].text(), "# 上海\n经济中心");
        assert!(entries[0].file_path.as_deref().unwrap().ends_with("shanghai.md"));
    }
}
