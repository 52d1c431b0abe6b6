use crate::traits::DocumentSource;
use crate::Document;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Markdown files under a root folder, addressed by `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct FolderCorpus {
    root: PathBuf,
}

impl FolderCorpus {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("corpus folder does not exist: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/').fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

pub fn discover_markdown_files(root: &Path) -> Vec<Document> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_markdown = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if !is_markdown {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let mtime = entry
            .metadata()
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .map(system_time_millis)
            .unwrap_or_default();

        documents.push(Document { path, mtime });
    }

    documents.sort_unstable_by(|left, right| left.path.cmp(&right.path));
    documents
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl DocumentSource for FolderCorpus {
    async fn list_documents(&self) -> io::Result<Vec<Document>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || discover_markdown_files(&root))
            .await
            .map_err(io::Error::other)
    }

    async fn read(&self, path: &str) -> io::Result<String> {
        tokio::fs::read_to_string(self.resolve(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_markdown_recursively_with_relative_paths(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("projects");
        fs::create_dir(&nested)?;
        fs::create_dir(dir.path().join(".obsidian"))?;

        fs::write(dir.path().join("inbox.md"), "# Inbox")?;
        fs::write(nested.join("alpha.MD"), "alpha")?;
        fs::write(nested.join("image.png"), [0u8, 1, 2])?;
        fs::write(dir.path().join(".obsidian").join("config.md"), "hidden")?;

        let corpus = FolderCorpus::new(dir.path())?;
        let documents = corpus.list_documents().await?;
        let paths: Vec<_> = documents.iter().map(|doc| doc.path.as_str()).collect();

        assert_eq!(paths, vec!["inbox.md", "projects/alpha.MD"]);
        assert!(documents.iter().all(|doc| doc.mtime > 0));
        assert!(corpus.read("projects/missing.md").await.is_err());
        assert_eq!(corpus.read("inbox.md").await?, "# Inbox");
        Ok(())
    }

    #[test]
    fn missing_root_is_rejected() {
        assert!(FolderCorpus::new("/definitely/not/here").is_err());
    }
}
