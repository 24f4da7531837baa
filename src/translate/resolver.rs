use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::cache::{CacheKey, TranslationCache};
use super::retry::{FailureKind, RetryPolicy, run_with_retry};
use super::TranslationService;

/// Outcome of resolving one (lemma, target language) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Cached(String),
    Fetched(String),
    Failed(FailureKind),
}

impl Resolution {
    pub fn gloss(&self) -> Option<&str> {
        match self {
            Resolution::Cached(gloss) | Resolution::Fetched(gloss) => Some(gloss),
            Resolution::Failed(_) => None,
        }
    }
}

/// Cache-through gloss lookup for one run.
///
/// Concurrent requests for the same key share a single resolution, so at
/// most one external request per key is in flight. Results, failures
/// included, are remembered until the resolver is dropped; failures are
/// never written to the persistent cache.
pub struct Resolver {
    cache: Arc<TranslationCache>,
    service: Arc<dyn TranslationService>,
    policy: RetryPolicy,
    source_language: String,
    api_key: String,
    in_flight: Mutex<HashMap<CacheKey, Arc<OnceCell<Resolution>>>>,
    external_calls: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl Resolver {
    pub fn new(
        cache: Arc<TranslationCache>,
        service: Arc<dyn TranslationService>,
        policy: RetryPolicy,
        source_language: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            service,
            policy,
            source_language: source_language.into(),
            api_key: api_key.into(),
            in_flight: Mutex::new(HashMap::new()),
            external_calls: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    pub async fn resolve(&self, lemma: &str, target_language: &str) -> Resolution {
        let key = CacheKey::new(lemma, target_language);
        let cell = self
            .in_flight
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| self.resolve_uncoalesced(&key)).await.clone()
    }

    /// Requests sent to the translation service, retries included
    pub fn external_calls(&self) -> usize {
        self.external_calls.load(Ordering::SeqCst)
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::SeqCst)
    }

    async fn resolve_uncoalesced(&self, key: &CacheKey) -> Resolution {
        if let Some(entry) = self.cache.get(key).await {
            self.cache_hits.fetch_add(1, Ordering::SeqCst);
            debug!("Cache hit for '{}': {}", key.lemma(), entry.gloss);
            return Resolution::Cached(entry.gloss);
        }

        let service = &self.service;
        let calls = &self.external_calls;
        let source_language = self.source_language.as_str();
        let api_key = self.api_key.as_str();

        let result = run_with_retry(&self.policy, move |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            debug!("Translating '{}' (attempt {})", key.lemma(), attempt);
            service.translate(key.lemma(), source_language, key.target_language(), api_key)
        })
        .await;

        match result {
            Ok(gloss) => {
                if let Err(e) = self.cache.put(key, &gloss).await {
                    warn!("Gloss for '{}' was not persisted: {}", key.lemma(), e);
                }
                Resolution::Fetched(gloss)
            }
            Err(kind) => {
                warn!("Could not resolve '{}': {}", key.lemma(), kind);
                Resolution::Failed(kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{MockTranslationService, ServiceError, ServiceErrorKind};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;

    struct SlowCountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationService for SlowCountingService {
        async fn translate(
            &self,
            text: &str,
            _source_language: &str,
            _target_language: &str,
            _api_key: &str,
        ) -> std::result::Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(format!("<{}>", text))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
            total_budget_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_call() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(TranslationCache::open(dir.path()).unwrap());
        cache.put(&CacheKey::new("ephemeral", "ja"), "はかない").await.unwrap();

        let mut service = MockTranslationService::new();
        service.expect_translate().times(0);

        let resolver = Resolver::new(cache, Arc::new(service), fast_policy(), "EN", "key");
        let resolution = resolver.resolve("Ephemeral", "JA").await;
        assert_eq!(resolution, Resolution::Cached("はかない".to_string()));
        assert_eq!(resolver.cache_hits(), 1);
        assert_eq!(resolver.external_calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_writes_through() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(TranslationCache::open(dir.path()).unwrap());

        let mut service = MockTranslationService::new();
        service
            .expect_translate()
            .withf(|text, source, target, key| {
                text.to_string() == "dawn"
                    && source.to_string() == "EN"
                    && target.to_string() == "ja"
                    && key.to_string() == "secret"
            })
            .times(1)
            .returning(|_, _, _, _| Ok("夜明け".to_string()));

        let resolver = Resolver::new(cache.clone(), Arc::new(service), fast_policy(), "EN", "secret");
        assert_eq!(resolver.resolve("dawn", "ja").await, Resolution::Fetched("夜明け".to_string()));

        let stored = cache.get(&CacheKey::new("dawn", "ja")).await.unwrap();
        assert_eq!(stored.gloss, "夜明け");
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_call() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(TranslationCache::open(dir.path()).unwrap());
        let service = Arc::new(SlowCountingService {
            calls: AtomicUsize::new(0),
        });
        let resolver = Arc::new(Resolver::new(cache, service.clone(), fast_policy(), "EN", "key"));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move { resolver.resolve("run", "ja").await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Resolution::Fetched("<run>".to_string()));
        }

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.external_calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried_or_persisted() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(TranslationCache::open(dir.path()).unwrap());

        let mut service = MockTranslationService::new();
        service
            .expect_translate()
            .times(1)
            .returning(|_, _, _, _| Err(ServiceError::Auth("invalid key".to_string())));

        let resolver = Resolver::new(cache.clone(), Arc::new(service), fast_policy(), "EN", "bad");
        let expected = Resolution::Failed(FailureKind::Rejected(ServiceErrorKind::Auth));
        assert_eq!(resolver.resolve("obscure", "ja").await, expected);
        // memoized for the rest of the run
        assert_eq!(resolver.resolve("obscure", "ja").await, expected);

        assert!(cache.get(&CacheKey::new("obscure", "ja")).await.is_none());
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_network_errors_are_retried() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(TranslationCache::open(dir.path()).unwrap());

        let mut service = MockTranslationService::new();
        let mut seq = mockall::Sequence::new();
        service
            .expect_translate()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(ServiceError::Network("timeout".to_string())));
        service
            .expect_translate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok("走る".to_string()));

        let resolver = Resolver::new(cache, Arc::new(service), fast_policy(), "EN", "key");
        assert_eq!(resolver.resolve("run", "ja").await, Resolution::Fetched("走る".to_string()));
        assert_eq!(resolver.external_calls(), 3);
    }
}
