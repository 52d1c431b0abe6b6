use crate::store::rank_by_similarity;
use crate::traits::VectorStore;
use crate::{IndexedVector, SearchHit, SearchScope, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Snapshot {
    version: u32,
    records: Vec<IndexedVector>,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<IndexedVector>,
    dirty: bool,
}

/// Vector store that keeps every record in memory and persists a JSON
/// snapshot on `save`.
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl JsonFileStore {
    /// Loads the snapshot at `path`, or starts empty when none exists yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(StoreError::UnsupportedVersion(snapshot.version));
                }
                snapshot.records
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };

        tracing::debug!(path = %path.display(), records = records.len(), "opened vector store");
        Ok(Self {
            path,
            state: RwLock::new(State {
                records,
                dirty: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VectorStore for JsonFileStore {
    async fn insert_batch(&self, records: &[IndexedVector], model: &str) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let expected = state
            .records
            .iter()
            .find(|record| record.model == model)
            .map(|record| record.embedding.len())
            .unwrap_or(records[0].embedding.len());

        if let Some(record) = records
            .iter()
            .find(|record| record.embedding.len() != expected)
        {
            return Err(StoreError::DimensionMismatch {
                model: model.to_string(),
                expected,
                actual: record.embedding.len(),
            });
        }

        state.records.extend(records.iter().cloned().map(|mut record| {
            record.model = model.to_string();
            record
        }));
        state.dirty = true;
        Ok(())
    }

    async fn delete_for_paths(&self, paths: &[String], model: &str) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }

        let targets: HashSet<&str> = paths.iter().map(String::as_str).collect();
        let mut state = self.state.write().await;
        let before = state.records.len();
        state
            .records
            .retain(|record| record.model != model || !targets.contains(record.path.as_str()));
        if state.records.len() != before {
            state.dirty = true;
        }
        Ok(())
    }

    async fn delete_all(&self, model: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|record| record.model != model);
        if state.records.len() != before {
            state.dirty = true;
        }
        Ok(())
    }

    async fn list_indexed_paths(&self, model: &str) -> Result<HashSet<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|record| record.model == model)
            .map(|record| record.path.clone())
            .collect())
    }

    async fn get_by_path(&self, path: &str, model: &str) -> Result<Vec<IndexedVector>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|record| record.model == model && record.path == path)
            .cloned()
            .collect())
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        model: &str,
        min_similarity: f32,
        limit: usize,
        scope: Option<&SearchScope>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let state = self.state.read().await;
        Ok(rank_by_similarity(
            &state.records,
            query_vector,
            model,
            min_similarity,
            limit,
            scope,
        ))
    }

    async fn save(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.dirty && tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }

        let bytes = serde_json::to_vec(&SnapshotRef {
            version: SNAPSHOT_VERSION,
            records: &state.records,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        state.dirty = false;
        tracing::debug!(path = %self.path.display(), records = state.records.len(), "saved vector store");
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    records: &'a [IndexedVector],
}
