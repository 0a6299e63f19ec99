/// File discovery utilities for finding knowledge base markdown files
use std::path::{Path, PathBuf};
use tokio::fs;

/// Discover all .md files in a directory recursively, sorted by path
pub async fn discover_markdown_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = collect_markdown_files(dir).await?;
    files.sort();
    Ok(files)
}

async fn collect_markdown_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let dir = dir.to_path_buf();
    Box::pin(async move {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_file() {
                if path.extension().is_some_and(|extension| extension == "md") {
                    files.push(path);
                }
            } else if path.is_dir() {
                // Skip hidden directories
                if let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) {
                    if !dir_name.starts_with('.') {
                        let mut sub_files = collect_markdown_files(&path).await?;
                        files.append(&mut sub_files);
                    }
                }
            }
        }

        Ok(files)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_discover_markdown_files() {
        let temp_dir = TempDir::new().unwrap();
        let test_dir = temp_dir.path();

        fs::write(test_dir.join("b.md"), "content").unwrap();
        fs::write(test_dir.join("a.md"), "content").unwrap();
        fs::write(test_dir.join("file.txt"), "content").unwrap(); // Should be ignored

        let sub_dir = test_dir.join("subdir");
        fs::create_dir(&sub_dir).unwrap();
        fs::write(sub_dir.join("c.md"), "content").unwrap();

        let hidden = test_dir.join(".cache");
        fs::create_dir(&hidden).unwrap();
        fs::write(hidden.join("skipped.md"), "content").unwrap();

        let files = discover_markdown_files(test_dir).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(test_dir).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md", "subdir/c.md"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_markdown_files(&temp_dir.path().join("missing"))
            .await
            .is_err());
    }
}
