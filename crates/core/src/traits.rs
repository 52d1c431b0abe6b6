use crate::{Document, IndexedVector, SearchHit, SearchScope, StoreError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Persistent home of indexed chunks. Every operation is scoped to one model.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert_batch(&self, records: &[IndexedVector], model: &str) -> Result<(), StoreError>;

    async fn delete_for_paths(&self, paths: &[String], model: &str) -> Result<(), StoreError>;

    async fn delete_all(&self, model: &str) -> Result<(), StoreError>;

    async fn list_indexed_paths(&self, model: &str) -> Result<HashSet<String>, StoreError>;

    async fn get_by_path(&self, path: &str, model: &str) -> Result<Vec<IndexedVector>, StoreError>;

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        model: &str,
        min_similarity: f32,
        limit: usize,
        scope: Option<&SearchScope>,
    ) -> Result<Vec<SearchHit>, StoreError>;

    /// Durably flushes prior mutations. Safe to call repeatedly.
    async fn save(&self) -> Result<(), StoreError>;
}

/// The live set of documents being indexed.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_documents(&self) -> std::io::Result<Vec<Document>>;

    async fn read(&self, path: &str) -> std::io::Result<String>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for Arc<T> {
    async fn insert_batch(&self, records: &[IndexedVector], model: &str) -> Result<(), StoreError> {
        (**self).insert_batch(records, model).await
    }

    async fn delete_for_paths(&self, paths: &[String], model: &str) -> Result<(), StoreError> {
        (**self).delete_for_paths(paths, model).await
    }

    async fn delete_all(&self, model: &str) -> Result<(), StoreError> {
        (**self).delete_all(model).await
    }

    async fn list_indexed_paths(&self, model: &str) -> Result<HashSet<String>, StoreError> {
        (**self).list_indexed_paths(model).await
    }

    async fn get_by_path(&self, path: &str, model: &str) -> Result<Vec<IndexedVector>, StoreError> {
        (**self).get_by_path(path, model).await
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        model: &str,
        min_similarity: f32,
        limit: usize,
        scope: Option<&SearchScope>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        (**self)
            .similarity_search(query_vector, model, min_similarity, limit, scope)
            .await
    }

    async fn save(&self) -> Result<(), StoreError> {
        (**self).save().await
    }
}
