use crate::embeddings::{EmbeddingProvider, OPENAI_BASE_URL};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Where a provider's credentials come from, checked on every call.
#[derive(Debug, Clone)]
enum Access {
    ApiKey(String),
    BaseUrl,
}

/// Client for any endpoint speaking the OpenAI `/embeddings` wire shape.
pub struct OpenAiCompatibleProvider {
    client: Client,
    provider: &'static str,
    model: String,
    endpoint: Option<Url>,
    access: Access,
}

impl OpenAiCompatibleProvider {
    pub fn openai(
        model: impl Into<String>,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: build_client(timeout)?,
            provider: "OpenAI",
            model: model.into(),
            endpoint: Some(embeddings_endpoint(OPENAI_BASE_URL)?),
            access: Access::ApiKey(api_key.trim().to_string()),
        })
    }

    /// Ollama serves the OpenAI-compatible API under `{base_url}/v1`.
    pub fn ollama(
        model: impl Into<String>,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        let base_url = base_url.trim().trim_end_matches('/');
        let endpoint = if base_url.is_empty() {
            None
        } else {
            Some(embeddings_endpoint(&format!("{base_url}/v1"))?)
        };

        Ok(Self {
            client: build_client(timeout)?,
            provider: "Ollama",
            model: model.into(),
            endpoint,
            access: Access::BaseUrl,
        })
    }
}

fn build_client(timeout: Option<Duration>) -> Result<Client, EmbeddingError> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

fn embeddings_endpoint(base: &str) -> Result<Url, EmbeddingError> {
    Ok(Url::parse(&format!("{}/", base.trim_end_matches('/')))?.join("embeddings")?)
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| EmbeddingError::MissingBaseUrl {
                provider: self.provider.to_string(),
            })?;

        let mut request = self.client.post(endpoint.clone()).json(&json!({
            "model": self.model,
            "input": text,
        }));
        if let Access::ApiKey(key) = &self.access {
            if key.is_empty() {
                return Err(EmbeddingError::MissingApiKey {
                    provider: self.provider.to_string(),
                });
            }
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::from_status(
                self.provider,
                status.as_u16(),
                body,
            ));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!(
                    "{} returned no embedding for model {}",
                    self.provider, self.model
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_endpoint_is_under_v1() {
        let provider =
            OpenAiCompatibleProvider::ollama("bge-m3", "http://localhost:11434/", None).unwrap();
        assert_eq!(
            provider.endpoint.map(|url| url.to_string()),
            Some("http://localhost:11434/v1/embeddings".to_string())
        );
    }

    #[test]
    fn openai_endpoint_uses_public_api() {
        let provider = OpenAiCompatibleProvider::openai(
            "text-embedding-3-small",
            "sk-test",
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(
            provider.endpoint.map(|url| url.to_string()),
            Some("https://api.openai.com/v1/embeddings".to_string())
        );
    }

    #[test]
    fn malformed_ollama_address_is_rejected() {
        let result = OpenAiCompatibleProvider::ollama("bge-m3", "not a url", None);
        assert!(matches!(result, Err(EmbeddingError::Url(_))));
    }
}
