use crate::embeddings::EmbeddingModel;
use crate::error::SearchError;
use crate::models::{SearchHit, SearchOptions};
use crate::traits::VectorStore;

/// Read path: embeds the query once and asks the store for neighbours.
pub struct QueryEngine<S> {
    store: S,
}

impl<S: VectorStore> QueryEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn search(
        &self,
        query_text: &str,
        model: &EmbeddingModel,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query_text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let query_vector = model.embed(query_text).await?;
        let hits = self
            .store
            .similarity_search(
                &query_vector,
                model.name(),
                options.min_similarity,
                options.limit,
                options.scope.as_ref(),
            )
            .await?;

        tracing::debug!(model = model.name(), hits = hits.len(), "similarity search");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::JsonFileStore;
    use crate::{ChunkMetadata, EmbeddingError, EmbeddingProvider, IndexedVector, SearchScope};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct Unconfigured;

    #[async_trait]
    impl EmbeddingProvider for Unconfigured {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::MissingBaseUrl {
                provider: "Ollama".to_string(),
            })
        }
    }

    fn ngram_model() -> EmbeddingModel {
        let embedder = CharacterNgramEmbedder::default();
        EmbeddingModel::new("ngram-local", embedder.dimensions, Arc::new(embedder))
    }

    async fn seeded_store(
        model: &EmbeddingModel,
        notes: &[(&str, &str)],
    ) -> Result<(tempfile::TempDir, JsonFileStore), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JsonFileStore::open(dir.path().join("vectors.json")).await?;
        let mut records = Vec::new();
        for (path, content) in notes {
            records.push(IndexedVector {
                path: path.to_string(),
                mtime: 1,
                content: content.to_string(),
                metadata: ChunkMetadata {
                    start_line: 1,
                    end_line: 1,
                },
                embedding: model.embed(content).await?,
                model: model.name().to_string(),
            });
        }
        store.insert_batch(&records, model.name()).await?;
        Ok((dir, store))
    }

    #[tokio::test]
    async fn results_are_ordered_and_limited() -> Result<(), Box<dyn std::error::Error>> {
        let model = ngram_model();
        let (_dir, store) = seeded_store(
            &model,
            &[
                ("garden.md", "tomato seedlings need warm soil"),
                ("rust.md", "borrow checker and lifetimes"),
                ("tomatoes.md", "tomato seedlings"),
            ],
        )
        .await?;
        let engine = QueryEngine::new(store);

        let options = SearchOptions {
            min_similarity: 0.1,
            limit: 2,
            scope: None,
        };
        let hits = engine.search("tomato seedlings", &model, &options).await?;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.path, "tomatoes.md");
        assert_eq!(hits[1].record.path, "garden.md");
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits.iter().all(|hit| hit.similarity >= 0.1));
        Ok(())
    }

    #[tokio::test]
    async fn scope_restricts_results() -> Result<(), Box<dyn std::error::Error>> {
        let model = ngram_model();
        let (_dir, store) = seeded_store(
            &model,
            &[
                ("daily/monday.md", "standup notes"),
                ("projects/plan.md", "standup notes"),
            ],
        )
        .await?;
        let engine = QueryEngine::new(store);

        let options = SearchOptions {
            min_similarity: 0.0,
            limit: 10,
            scope: Some(SearchScope {
                files: Vec::new(),
                folders: vec!["projects".to_string()],
            }),
        };
        let hits = engine.search("standup", &model, &options).await?;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.path, "projects/plan.md");
        Ok(())
    }

    #[tokio::test]
    async fn configuration_errors_are_distinct() -> Result<(), Box<dyn std::error::Error>> {
        let model = ngram_model();
        let (_dir, store) = seeded_store(&model, &[("a.md", "alpha")]).await?;
        let engine = QueryEngine::new(store);
        let broken = EmbeddingModel::new("ngram-local", 128, Arc::new(Unconfigured));

        let error = engine
            .search("alpha", &broken, &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, SearchError::Configuration(_)));

        let empty = engine.search("   ", &model, &SearchOptions::default()).await;
        assert!(matches!(empty, Err(SearchError::EmptyQuery)));
        Ok(())
    }
}
