//! Summarization for SmileScript: remote provider with local degradation
//!
//! Provides a `SummaryBackend` trait with an implementation for:
//! - **OpenAI**: chat completions API, single attempt, bounded timeout
//!
//! and the `Summarizer` adapter, which wraps an optional backend and collapses
//! every backend error into the deterministic `fallback_summarize` output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SummarizerConfig;

/// Label prepended to every locally generated summary
pub const FALLBACK_PREFIX: &str = "Summary of: ";

/// Number of characters of the transcript kept by the local summary
pub const FALLBACK_MAX_CHARS: usize = 50;

/// Fixed system instruction sent with every remote request
pub const SYSTEM_PROMPT: &str = "You are a dental clinic assistant. Condense the following call \
transcript, highlighting key patient information, concerns, and any scheduled follow-up.";

// ============================================================================
// Local fallback
// ============================================================================

/// Deterministic local summary: the first 50 characters of `text`, with `...`
/// appended when anything was cut, behind the `Summary of: ` label.
pub fn fallback_summarize(text: &str) -> String {
    let mut head: String = text.chars().take(FALLBACK_MAX_CHARS).collect();
    if text.chars().count() > FALLBACK_MAX_CHARS {
        head.push_str("...");
    }
    format!("{}{}", FALLBACK_PREFIX, head)
}

// ============================================================================
// SummaryBackend trait
// ============================================================================

/// Abstraction over remote summarization providers.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// Summarize `text`. Errors are reported as-is; degradation is the
    /// caller's job.
    async fn summarize(&self, text: &str) -> Result<String, SummaryError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing summary content in response")]
    MissingContent,

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiSummaryClient
// ============================================================================

/// OpenAI summary client: calls the chat completions endpoint once per request.
#[derive(Debug, Clone)]
pub struct OpenAiSummaryClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    base_url: String,
}

impl OpenAiSummaryClient {
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummaryError> {
        let api_key = config
            .api_key()
            .ok_or(SummaryError::MissingApiKey)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SummaryBackend for OpenAiSummaryClient {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            return Err(SummaryError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(SummaryError::MissingContent)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Summarizer
// ============================================================================

/// Summarization adapter. Never fails: without a backend, or when the backend
/// errors, the local fallback summary is returned and the error is logged.
#[derive(Clone, Default)]
pub struct Summarizer {
    backend: Option<Arc<dyn SummaryBackend>>,
}

impl Summarizer {
    /// Build from configuration. Remote summarization is used only when it is
    /// switched on and a key is configured.
    pub fn from_config(config: &SummarizerConfig) -> Self {
        if !config.remote_enabled() {
            tracing::info!("Remote summarization disabled, using local summaries");
            return Self::local();
        }

        match OpenAiSummaryClient::new(config) {
            Ok(client) => {
                tracing::info!(model = %config.model, "Remote summarization enabled");
                Self::with_backend(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build OpenAI client, using local summaries");
                Self::local()
            }
        }
    }

    pub fn with_backend(backend: Arc<dyn SummaryBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn local() -> Self {
        Self { backend: None }
    }

    pub fn is_remote(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn summarize(&self, text: &str) -> String {
        let Some(backend) = &self.backend else {
            return fallback_summarize(text);
        };

        match backend.summarize(text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    backend = backend.name(),
                    error = %e,
                    "Remote summarization failed, using local summary"
                );
                fallback_summarize(text)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TRANSCRIPT: &str = "Patient called about tooth pain";

    fn test_config(base_url: &str) -> SummarizerConfig {
        SummarizerConfig {
            use_remote: true,
            api_key: Some("test-api-key".to_string()),
            model: "gpt-3.5-turbo".to_string(),
            base_url: base_url.to_string(),
            timeout_seconds: 5,
            max_tokens: 150,
            temperature: 0.5,
        }
    }

    fn mock_chat_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    // --- fallback_summarize ---

    #[test]
    fn test_fallback_short_text_has_no_ellipsis() {
        assert_eq!(
            fallback_summarize(TRANSCRIPT),
            "Summary of: Patient called about tooth pain"
        );
    }

    #[test]
    fn test_fallback_exactly_fifty_chars_has_no_ellipsis() {
        let text = "a".repeat(50);
        assert_eq!(fallback_summarize(&text), format!("Summary of: {}", text));
    }

    #[test]
    fn test_fallback_long_text_is_truncated() {
        let text = "Patient called to reschedule the cleaning appointment for next Tuesday";
        let expected = format!("Summary of: {}...", &text[..50]);
        assert_eq!(fallback_summarize(text), expected);
    }

    #[test]
    fn test_fallback_counts_characters_not_bytes() {
        let text = "é".repeat(60);
        let expected = format!("Summary of: {}...", "é".repeat(50));
        assert_eq!(fallback_summarize(&text), expected);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let text = "Caller asked whether the clinic accepts new patients on Saturdays";
        let first = fallback_summarize(text);
        for _ in 0..5 {
            assert_eq!(fallback_summarize(text), first);
        }
    }

    // --- OpenAiSummaryClient ---

    #[test]
    fn test_client_requires_api_key() {
        let mut config = test_config("http://localhost");
        config.api_key = None;
        match OpenAiSummaryClient::new(&config) {
            Err(SummaryError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }

    #[tokio::test]
    async fn test_client_sends_chat_request_and_trims_reply() {
        let mock_server = MockServer::start().await;
        let client = OpenAiSummaryClient::new(&test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": TRANSCRIPT }
                ],
                "max_tokens": 150,
                "temperature": 0.5
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_chat_response("  Patient reports tooth pain.\n")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let summary = client.summarize(TRANSCRIPT).await.unwrap();
        assert_eq!(summary, "Patient reports tooth pain.");
    }

    #[tokio::test]
    async fn test_client_reports_api_error() {
        let mock_server = MockServer::start().await;
        let client = OpenAiSummaryClient::new(&test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            })))
            .mount(&mock_server)
            .await;

        match client.summarize(TRANSCRIPT).await {
            Err(SummaryError::Api { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_rejects_empty_choices() {
        let mock_server = MockServer::start().await;
        let client = OpenAiSummaryClient::new(&test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.summarize(TRANSCRIPT).await,
            Err(SummaryError::MissingContent)
        ));
    }

    // --- Summarizer adapter ---

    #[tokio::test]
    async fn test_summarizer_returns_remote_summary_on_success() {
        let mock_server = MockServer::start().await;
        let summarizer = Summarizer::from_config(&test_config(&mock_server.uri()));
        assert!(summarizer.is_remote());

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_chat_response("Tooth pain, follow-up booked Monday.")),
            )
            .mount(&mock_server)
            .await;

        assert_eq!(
            summarizer.summarize(TRANSCRIPT).await,
            "Tooth pain, follow-up booked Monday."
        );
    }

    #[tokio::test]
    async fn test_summarizer_falls_back_on_server_error() {
        let mock_server = MockServer::start().await;
        let summarizer = Summarizer::from_config(&test_config(&mock_server.uri()));

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert_eq!(
            summarizer.summarize(TRANSCRIPT).await,
            fallback_summarize(TRANSCRIPT)
        );
    }

    #[tokio::test]
    async fn test_summarizer_falls_back_on_malformed_body() {
        let mock_server = MockServer::start().await;
        let summarizer = Summarizer::from_config(&test_config(&mock_server.uri()));

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        assert_eq!(
            summarizer.summarize(TRANSCRIPT).await,
            fallback_summarize(TRANSCRIPT)
        );
    }

    #[tokio::test]
    async fn test_summarizer_skips_network_when_disabled() {
        let mock_server = MockServer::start().await;
        let mut config = test_config(&mock_server.uri());
        config.use_remote = false;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("remote")))
            .expect(0)
            .mount(&mock_server)
            .await;

        let summarizer = Summarizer::from_config(&config);
        assert!(!summarizer.is_remote());
        assert_eq!(
            summarizer.summarize(TRANSCRIPT).await,
            fallback_summarize(TRANSCRIPT)
        );
    }

    #[tokio::test]
    async fn test_summarizer_skips_network_without_key() {
        let mut config = test_config("http://127.0.0.1:9");
        config.api_key = Some(String::new());

        let summarizer = Summarizer::from_config(&config);
        assert!(!summarizer.is_remote());
        assert_eq!(
            summarizer.summarize(TRANSCRIPT).await,
            fallback_summarize(TRANSCRIPT)
        );
    }

    #[tokio::test]
    async fn test_summarizer_falls_back_when_provider_times_out() {
        let mock_server = MockServer::start().await;
        let mut config = test_config(&mock_server.uri());
        config.timeout_seconds = 1;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_chat_response("too late"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let summarizer = Summarizer::from_config(&config);
        assert!(summarizer.is_remote());

        let started = std::time::Instant::now();
        let summary = summarizer.summarize(TRANSCRIPT).await;
        assert_eq!(summary, fallback_summarize(TRANSCRIPT));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
