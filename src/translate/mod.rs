// Gloss resolution
//
// A lemma is turned into a gloss through the persistent cache first and the
// external translation service second. The service sits behind a trait so
// the pipeline never knows which vendor it talks to.
//
// - cache: per-key JSON files with atomic upsert
// - retry: backoff state machine and its async driver
// - resolver: cache-through resolution with in-flight coalescing
// - deepl: DeepL HTTP client

pub mod cache;
pub mod deepl;
pub mod resolver;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::{CacheInfo, CacheKey, TranslationCache, TranslationCacheEntry};
pub use deepl::DeepLTranslator;
pub use resolver::{Resolution, Resolver};
pub use retry::{FailureKind, RetryPolicy, RetryState};

/// Errors a translation service may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("quota exhausted: {0}")]
    Quota(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceErrorKind {
    Auth,
    RateLimit,
    Network,
    Quota,
}

impl ServiceError {
    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            ServiceError::Auth(_) => ServiceErrorKind::Auth,
            ServiceError::RateLimit(_) => ServiceErrorKind::RateLimit,
            ServiceError::Network(_) => ServiceErrorKind::Network,
            ServiceError::Quota(_) => ServiceErrorKind::Quota,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl ServiceErrorKind {
    /// Transient failures are worth another attempt; credential and quota problems are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceErrorKind::Network | ServiceErrorKind::RateLimit)
    }
}

/// External translation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        api_key: &str,
    ) -> std::result::Result<String, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ServiceError::Network("reset".into()).is_retryable());
        assert!(ServiceError::RateLimit("429".into()).is_retryable());
        assert!(!ServiceError::Auth("403".into()).is_retryable());
        assert!(!ServiceError::Quota("456".into()).is_retryable());
    }
}
