use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http::{ApiKey, is_transient, snippet, with_retry};
use crate::lang::LanguageCode;

const API_BASE: &str = "https://ws.detectlanguage.com/0.2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("detection API rejected the API key")]
    Unauthorized,

    #[error("detection API rate limit exceeded")]
    RateLimited,

    #[error("detection API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("no language detected for query")]
    NoDetection,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Identifies the language a piece of text is written in.
pub trait Detector {
    async fn detect(&self, text: &str) -> Result<LanguageCode, DetectError>;
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Debug, Deserialize)]
struct DetectData {
    #[serde(default)]
    detections: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
}

/// Client for the detectlanguage.com API.
#[derive(Debug, Clone)]
pub struct DetectLanguageClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl DetectLanguageClient {
    pub fn new(http: Client, api_key: ApiKey) -> Self {
        Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            base_url: base_url.to_string(),
        }
    }

    async fn detect_once(&self, text: &str) -> Result<LanguageCode, DetectError> {
        let url = format!("{}/detect", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .form(&[("q", text)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            401 => return Err(DetectError::Unauthorized),
            429 => {
                warn!("detection API rate limited");
                return Err(DetectError::RateLimited);
            }
            _ if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(DetectError::Api {
                    code: status.as_u16(),
                    message: format!("HTTP {status}: {}", snippet(&text)),
                });
            }
            _ => {}
        }

        let body: DetectResponse = response.json().await?;
        let language = body
            .data
            .detections
            .into_iter()
            .next()
            .map(|d| LanguageCode::new(&d.language))
            .ok_or(DetectError::NoDetection)?;

        debug!(%language, "language detected");
        Ok(language)
    }
}

impl Detector for DetectLanguageClient {
    async fn detect(&self, text: &str) -> Result<LanguageCode, DetectError> {
        with_retry(|| self.detect_once(text), is_retriable).await
    }
}

fn is_retriable(e: &DetectError) -> bool {
    match e {
        DetectError::Network(source) => is_transient(source),
        other => matches!(
            other,
            DetectError::RateLimited
                | DetectError::Api {
                    code: 500..=599,
                    ..
                }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn detect_returns_first_detection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("q=bonjour"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "detections": [
                        {"language": "FR", "isReliable": true, "confidence": 9.1},
                        {"language": "it", "isReliable": false, "confidence": 1.2}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = DetectLanguageClient::with_base_url(Client::new(), &server.uri());
        let lang = client.detect("bonjour").await.unwrap();
        assert_eq!(lang, LanguageCode::new("fr"));
    }

    #[tokio::test]
    async fn detect_without_detections_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"detections": []}
            })))
            .mount(&server)
            .await;

        let client = DetectLanguageClient::with_base_url(Client::new(), &server.uri());
        let result = client.detect("???").await;
        assert!(matches!(result, Err(DetectError::NoDetection)));
    }

    #[tokio::test]
    async fn detect_401_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = DetectLanguageClient::with_base_url(Client::new(), &server.uri());
        let result = client.detect("hello").await;
        assert!(matches!(result, Err(DetectError::Unauthorized)));
    }

    #[tokio::test]
    async fn detect_500_retries_then_reports_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(3)
            .mount(&server)
            .await;

        let client = DetectLanguageClient::with_base_url(Client::new(), &server.uri());
        match client.detect("hello").await {
            Err(DetectError::Api { code: 503, message }) => {
                assert!(message.contains("maintenance"), "got: {message}");
            }
            other => panic!("expected Api(503), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_retried_as_network_error() {
        let client = DetectLanguageClient::with_base_url(Client::new(), "http://127.0.0.1:1");
        let err = client.detect("hello").await.unwrap_err();
        assert!(matches!(err, DetectError::Network(_)), "got: {err:?}");
        assert!(is_retriable(&err));
    }
}
