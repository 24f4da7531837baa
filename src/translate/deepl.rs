use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ServiceError, TranslationService};
use crate::config::TranslateConfig;
use crate::error::{Result, RubigeneError};

const FREE_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";
const PRO_ENDPOINT: &str = "https://api.deepl.com/v2/translate";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// DeepL REST client.
pub struct DeepLTranslator {
    client: Client,
    endpoint: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl DeepLTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| RubigeneError::Translation(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = if config.use_pro_api { PRO_ENDPOINT } else { FREE_ENDPOINT };

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Point the client somewhere else (a proxy or a local stand-in).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Probe the service with a one-word translation.
    pub async fn validate_credentials(&self, api_key: &str, target_language: &str) -> Result<()> {
        match self.translate("hello", "EN", target_language, api_key).await {
            Ok(_) => {
                info!("Translation service credentials accepted");
                Ok(())
            }
            Err(ServiceError::Auth(message)) => Err(RubigeneError::Config(format!(
                "translation service rejected the API key: {}",
                message
            ))),
            Err(e) => Err(RubigeneError::Translation(format!(
                "could not verify the API key: {}",
                e
            ))),
        }
    }

    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Map an HTTP status to the service error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let message = format!("{} {}", status.as_u16(), body.trim());
    match status.as_u16() {
        401 | 403 => ServiceError::Auth(message),
        429 => ServiceError::RateLimit(message),
        456 => ServiceError::Quota(message),
        500..=599 => ServiceError::Network(message),
        _ => ServiceError::Auth(message),
    }
}

#[async_trait]
impl TranslationService for DeepLTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        api_key: &str,
    ) -> std::result::Result<String, ServiceError> {
        self.wait_for_slot().await;

        let source = source_language.to_uppercase();
        let target = target_language.to_uppercase();
        let params = [
            ("text", text),
            ("source_lang", source.as_str()),
            ("target_lang", target.as_str()),
        ];

        debug!("Sending '{}' to {}", text, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", api_key))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Network(format!("unreadable response: {}", e)))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ServiceError::Network("response carried no translations".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(classify_status(StatusCode::FORBIDDEN, ""), ServiceError::Auth(_)));
        assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, ""), ServiceError::Auth(_)));
        assert!(matches!(classify_status(StatusCode::TOO_MANY_REQUESTS, ""), ServiceError::RateLimit(_)));
        assert!(matches!(
            classify_status(StatusCode::from_u16(456).unwrap(), "Quota exceeded"),
            ServiceError::Quota(_)
        ));
        assert!(matches!(classify_status(StatusCode::BAD_GATEWAY, ""), ServiceError::Network(_)));
        assert!(matches!(classify_status(StatusCode::BAD_REQUEST, ""), ServiceError::Auth(_)));
    }

    #[test]
    fn test_endpoint_selection() {
        let mut config = TranslateConfig::default();
        assert_eq!(DeepLTranslator::new(&config).unwrap().endpoint(), FREE_ENDPOINT);
        config.use_pro_api = true;
        assert_eq!(DeepLTranslator::new(&config).unwrap().endpoint(), PRO_ENDPOINT);
    }

    #[test]
    fn test_response_shape() {
        let parsed: TranslateResponse =
            serde_json::from_str(r#"{"translations":[{"detected_source_language":"EN","text":"はかない"}]}"#).unwrap();
        assert_eq!(parsed.translations[0].text, "はかない");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let mut config = TranslateConfig::default();
        config.request_timeout_ms = 500;
        let translator = DeepLTranslator::new(&config)
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/v2/translate");
        let err = translator.translate("hello", "EN", "ja", "key").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
