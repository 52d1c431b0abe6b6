use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{provider} API key is missing. Please set it in settings.")]
    MissingApiKey { provider: String },

    #[error("{provider} API key is invalid: {message}")]
    InvalidApiKey { provider: String, message: String },

    #[error("{provider} address is missing. Please set it in settings.")]
    MissingBaseUrl { provider: String },

    #[error("rate limited by provider: {message}")]
    RateLimited { message: String },

    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
}

impl EmbeddingError {
    /// Errors the user can only fix by changing provider settings.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EmbeddingError::MissingApiKey { .. }
                | EmbeddingError::InvalidApiKey { .. }
                | EmbeddingError::MissingBaseUrl { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EmbeddingError::RateLimited { .. })
    }

    /// Maps a non-success HTTP response onto the error taxonomy.
    pub fn from_status(provider: &str, status: u16, message: String) -> Self {
        if status == 429 && message.to_lowercase().contains("rate limit") {
            EmbeddingError::RateLimited { message }
        } else if status == 401 {
            EmbeddingError::InvalidApiKey {
                provider: provider.to_string(),
                message,
            }
        } else {
            EmbeddingError::Provider { status, message }
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension {actual} does not match {expected} already stored for model {model}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation was aborted")]
    Aborted,

    #[error("invalid index options: {0}")]
    InvalidOptions(String),

    #[error("embedding task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("embedding provider is not configured: {0}")]
    Configuration(EmbeddingError),

    #[error("embedding failed: {0}")]
    Embedding(EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
}

impl From<EmbeddingError> for SearchError {
    fn from(error: EmbeddingError) -> Self {
        if error.is_configuration() {
            SearchError::Configuration(error)
        } else {
            SearchError::Embedding(error)
        }
    }
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_needs_status_and_message() {
        let limited = EmbeddingError::from_status("openai", 429, "Rate limit reached".to_string());
        assert!(limited.is_rate_limited());

        let quota = EmbeddingError::from_status("openai", 429, "quota exceeded".to_string());
        assert!(!quota.is_rate_limited());

        let server = EmbeddingError::from_status("openai", 500, "rate limit".to_string());
        assert!(!server.is_rate_limited());
    }

    #[test]
    fn unauthorized_is_a_configuration_error() {
        let error = EmbeddingError::from_status("openai", 401, "bad key".to_string());
        assert!(error.is_configuration());
        assert!(SearchError::from(error).to_string().contains("not configured"));
    }
}
