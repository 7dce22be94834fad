//! Remote inference providers.

use crate::config::ProviderSettings;
use async_trait::async_trait;
use persona_core::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const TEMPERATURE: f64 = 0.3;
pub const MAX_TOKENS: u32 = 1024;

/// Longest response body excerpt carried in an error.
const BODY_EXCERPT: usize = 200;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Provider returned an empty completion")]
    EmptyPayload,
    #[error("Unreadable provider response: {0}")]
    Decode(String),
}

/// A system and a user message for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// A remote model that turns a prompt into completion text.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, ProviderError>;
}

/// Connection details for one chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Build from settings. `None` when the provider has no credential.
    pub fn from_settings(
        name: impl Into<String>,
        settings: &ProviderSettings,
        timeout: Duration,
    ) -> Option<Self> {
        settings.api_key.as_ref().map(|api_key| Self {
            name: name.into(),
            api_key: api_key.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// OpenAI-compatible `chat/completions` client.
pub struct ChatCompletionsProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_request(&self, prompt: &Prompt) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS
        })
    }

    async fn send(&self, prompt: &Prompt) -> std::result::Result<String, ProviderError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("{}: {}", e, excerpt(&body))))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyPayload);
        }
        Ok(content)
    }
}

#[async_trait]
impl InferenceProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, ProviderError> {
        debug!(provider = %self.config.name, model = %self.config.model, "Requesting completion");

        match tokio::time::timeout(self.config.timeout, self.send(prompt)).await {
            Ok(Err(ProviderError::Http(e))) if e.is_timeout() => {
                Err(ProviderError::Timeout(self.config.timeout))
            }
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.timeout)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// At most [`BODY_EXCERPT`] characters of `body`, for logs and errors.
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(BODY_EXCERPT).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, timeout: Duration) -> ChatCompletionsProvider {
        ChatCompletionsProvider::new(ProviderConfig {
            name: "primary".to_string(),
            api_key: "sk-test".to_string(),
            base_url: format!("{}/v1/", server.uri()),
            model: "test-model".to_string(),
            timeout,
        })
        .unwrap()
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "Reply with JSON".to_string(),
            user: "{}".to_string(),
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "cmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "temperature": 0.3,
                "max_tokens": 1024
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\":true}")))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server, Duration::from_secs(5))
            .complete(&prompt())
            .await
            .unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .complete(&prompt())
            .await
            .unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_content_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .complete(&prompt())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyPayload));
    }

    #[tokio::test]
    async fn test_missing_choices_is_empty_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .complete(&prompt())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyPayload));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .complete(&prompt())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{}"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(200))
            .complete(&prompt())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).chars().count(), BODY_EXCERPT + 3);
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn test_disabled_settings_build_no_config() {
        let settings = ProviderSettings {
            api_key: None,
            base_url: "http://localhost".to_string(),
            model: "m".to_string(),
        };
        assert!(ProviderConfig::from_settings("primary", &settings, Duration::from_secs(1)).is_none());
    }
}
