use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 1-based, inclusive line range of a chunk inside its source document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub path: String,
    pub mtime: i64,
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedVector {
    pub path: String,
    pub mtime: i64,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
    pub model: String,
}

impl IndexedVector {
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            path: chunk.path,
            mtime: chunk.mtime,
            content: chunk.content,
            metadata: chunk.metadata,
            embedding,
            model: model.into(),
        }
    }

    pub fn without_embedding(&self) -> VectorRecord {
        VectorRecord {
            path: self.path.clone(),
            mtime: self.mtime,
            content: self.content.clone(),
            metadata: self.metadata,
            model: self.model.clone(),
        }
    }
}

/// Stored chunk as handed back to readers; carries no embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub path: String,
    pub mtime: i64,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub record: VectorRecord,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexProgress {
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub total_files: usize,
}

/// A live document as listed by a corpus. `mtime` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub mtime: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexOptions {
    pub chunk_size: usize,
    pub reindex_all: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            reindex_all: false,
        }
    }
}

/// Restricts a search to explicit files and/or folder prefixes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchScope {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

impl SearchScope {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        self.files.iter().any(|file| file == path)
            || self.folders.iter().any(|folder| {
                let folder = folder.trim_end_matches('/');
                folder.is_empty()
                    || path
                        .strip_prefix(folder)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOptions {
    pub min_similarity: f32,
    pub limit: usize,
    pub scope: Option<SearchScope>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_similarity: 0.0,
            limit: 10,
            scope: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub files: usize,
    pub chunks: usize,
    pub batches: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Nothing needed (re)indexing; the store was left untouched.
    UpToDate,
    Completed(IndexStats),
    /// The provider is missing settings; the message is meant for the user.
    ConfigurationRequired { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_matches_files_and_folder_prefixes() {
        let scope = SearchScope {
            files: vec!["inbox.md".to_string()],
            folders: vec!["projects/".to_string()],
        };

        assert!(scope.contains("inbox.md"));
        assert!(scope.contains("projects/alpha/notes.md"));
        assert!(!scope.contains("projects-archive/old.md"));
        assert!(!scope.contains("journal/2024.md"));
    }

    #[test]
    fn empty_scope_matches_everything() {
        assert!(SearchScope::default().contains("anything.md"));
    }

    #[test]
    fn record_view_drops_embedding() {
        let chunk = Chunk {
            path: "a.md".to_string(),
            mtime: 7,
            content: "hello".to_string(),
            metadata: ChunkMetadata {
                start_line: 1,
                end_line: 1,
            },
        };
        let vector = IndexedVector::from_chunk(chunk, vec![0.5, 0.5], "bge-m3");
        let record = vector.without_embedding();
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("embedding").is_none());
        assert_eq!(record.model, "bge-m3");
    }
}
