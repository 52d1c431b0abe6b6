use crate::error::IndexError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENCY: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Tuning knobs for one indexing pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndexerConfig {
    /// Upper bound on embedding calls in flight across the whole run.
    pub max_concurrency: usize,
    /// Number of embedded chunks persisted per store insert.
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl IndexerConfig {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.max_concurrency == 0 {
            return Err(IndexError::InvalidOptions(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(IndexError::InvalidOptions(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(IndexError::InvalidOptions(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = IndexerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrency, 50);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = IndexerConfig {
            batch_size: 0,
            ..IndexerConfig::default()
        };
        assert!(matches!(config.validate(), Err(IndexError::InvalidOptions(_))));
    }
}
