use crate::error::EmbeddingError;
use crate::providers::OpenAiCompatibleProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const NGRAM_EMBEDDING_DIMENSIONS: usize = 128;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// A named model whose `dimension` is fixed for every vector it produces.
#[derive(Clone)]
pub struct EmbeddingModel {
    name: String,
    dimension: usize,
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingModel {
    pub fn new(
        name: impl Into<String>,
        dimension: usize,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            dimension,
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.provider.embed(text).await?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::InvalidResponse(format!(
                "{} returned {} dimensions, expected {}",
                self.name,
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }
}

impl fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Credentials and addresses the remote providers need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub openai_api_key: String,
    pub ollama_base_url: String,
    /// Per-request deadline for remote embedding calls. No deadline when unset.
    pub request_timeout: Option<Duration>,
}

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

type ProviderFactory =
    fn(&str, &ProviderSettings) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError>;

struct RegistryEntry {
    name: &'static str,
    dimension: usize,
    factory: ProviderFactory,
}

/// Maps model names to the constructor of their provider.
pub struct EmbeddingModelRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for EmbeddingModelRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                RegistryEntry {
                    name: "text-embedding-3-small",
                    dimension: 1536,
                    factory: openai_provider,
                },
                RegistryEntry {
                    name: "text-embedding-3-large",
                    dimension: 3072,
                    factory: openai_provider,
                },
                RegistryEntry {
                    name: "nomic-embed-text",
                    dimension: 768,
                    factory: ollama_provider,
                },
                RegistryEntry {
                    name: "mxbai-embed-large",
                    dimension: 1024,
                    factory: ollama_provider,
                },
                RegistryEntry {
                    name: "bge-m3",
                    dimension: 1024,
                    factory: ollama_provider,
                },
                RegistryEntry {
                    name: "ngram-local",
                    dimension: NGRAM_EMBEDDING_DIMENSIONS,
                    factory: ngram_provider,
                },
            ],
        }
    }
}

impl EmbeddingModelRegistry {
    pub fn model_names(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.entries.iter().map(|entry| (entry.name, entry.dimension))
    }

    pub fn get(
        &self,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<EmbeddingModel, EmbeddingError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| EmbeddingError::UnknownModel(name.to_string()))?;
        let provider = (entry.factory)(entry.name, settings)?;
        Ok(EmbeddingModel::new(entry.name, entry.dimension, provider))
    }
}

fn openai_provider(
    model: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    Ok(Arc::new(OpenAiCompatibleProvider::openai(
        model,
        &settings.openai_api_key,
        settings.request_timeout,
    )?))
}

fn ollama_provider(
    model: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    Ok(Arc::new(OpenAiCompatibleProvider::ollama(
        model,
        &settings.ollama_base_url,
        settings.request_timeout,
    )?))
}

fn ngram_provider(
    _model: &str,
    _settings: &ProviderSettings,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    Ok(Arc::new(CharacterNgramEmbedder::default()))
}

/// Offline provider hashing character trigrams into a fixed number of buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: NGRAM_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for ch in window {
                let mut buffer = [0u8; 4];
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for CharacterNgramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ngram_embedder_is_deterministic_and_normalized() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_sync("Hydraulic pressure and flow");
        let second = embedder.embed_sync("Hydraulic pressure and flow");
        assert_eq!(first, second);

        let norm = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn registry_knows_model_dimensions() {
        let registry = EmbeddingModelRegistry::default();
        let settings = ProviderSettings::default();

        let model = registry.get("text-embedding-3-large", &settings).unwrap();
        assert_eq!(model.name(), "text-embedding-3-large");
        assert_eq!(model.dimension(), 3072);
        assert_eq!(registry.model_names().count(), 6);
    }

    #[test]
    fn unknown_model_is_rejected() {
        let registry = EmbeddingModelRegistry::default();
        let error = registry
            .get("does-not-exist", &ProviderSettings::default())
            .unwrap_err();
        assert!(matches!(error, EmbeddingError::UnknownModel(_)));
    }

    #[tokio::test]
    async fn missing_credentials_surface_at_call_time() {
        let registry = EmbeddingModelRegistry::default();
        let settings = ProviderSettings::default();

        let openai = registry.get("text-embedding-3-small", &settings).unwrap();
        let error = openai.embed("hello").await.unwrap_err();
        assert!(matches!(error, EmbeddingError::MissingApiKey { .. }));

        let ollama = registry.get("bge-m3", &settings).unwrap();
        let error = ollama.embed("hello").await.unwrap_err();
        assert!(matches!(error, EmbeddingError::MissingBaseUrl { .. }));
        assert!(error.is_configuration());
    }

    #[tokio::test]
    async fn model_rejects_wrong_dimension() {
        let model = EmbeddingModel::new(
            "tiny",
            4,
            Arc::new(CharacterNgramEmbedder { dimensions: 8 }),
        );
        let error = model.embed("abc").await.unwrap_err();
        assert!(matches!(error, EmbeddingError::InvalidResponse(_)));
    }
}
