//! OpenAI-compatible chat-completion client
//!
//! Talks to any endpoint exposing `POST {base_url}/chat/completions`
//! (OpenRouter by default) with bearer-token auth.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::errors::{RagError, Result, Stage};
use crate::models::types::{ChatCompletion, ChatRequest, CompletionBody, CompletionResponse};
use crate::models::ChatModel;

/// HTTP client for chat completions
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://openrouter.ai/api/v1`
    /// * `api_key` - Bearer token; omitted from requests when `None`
    /// * `model` - Model identifier sent with every request
    /// * `timeout` - Per-request deadline
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Initialization(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Deadline hits become `Timeout`; everything else is a generation error
    fn transport_error(&self, context: &str, e: reqwest::Error) -> RagError {
        if e.is_timeout() {
            RagError::Timeout {
                stage: Stage::Generation,
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RagError::Generation(format!("{}: {}", context, e))
        }
    }

    /// Check if the endpoint answers at all
    ///
    /// Calls GET /models; any HTTP response counts as reachable.
    pub async fn is_available(&self) -> bool {
        let mut request = self
            .client
            .get(self.endpoint("models"))
            .timeout(Duration::from_secs(5));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await.is_ok()
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let body = CompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut http = self.client.post(self.endpoint("chat/completions")).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| self.transport_error("Failed to reach chat endpoint", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "Chat endpoint returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error("Failed to parse completion", e))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Generation("Completion had no choices".to_string()))?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion finished"
            );
        }

        Ok(ChatCompletion {
            content,
            usage: parsed.usage,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new(
            "https://openrouter.ai/api/v1/",
            Some("sk-test".to_string()),
            "ai21/jamba-mini-1.7",
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://openrouter.ai/api/v1");
        assert_eq!(client.model(), "ai21/jamba-mini-1.7");
        assert_eq!(
            client.endpoint("chat/completions"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_blank_api_key_dropped() {
        let client =
            ChatClient::new("http://localhost:8080", Some("  ".to_string()), "m", Duration::from_secs(1))
                .unwrap();
        assert!(client.api_key.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_generation_error() {
        let client =
            ChatClient::new("http://127.0.0.1:9", None, "m", Duration::from_millis(500)).unwrap();
        let err = client
            .complete(&ChatRequest::single("merhaba", 0.2, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client =
            ChatClient::new(format!("http://{}", addr), None, "m", Duration::from_millis(200)).unwrap();
        let err = client
            .complete(&ChatRequest::single("merhaba", 0.2, 10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RagError::Timeout {
                stage: Stage::Generation,
                duration_ms: 200
            }
        ));
        assert!(!err.is_recoverable());
        server.abort();
    }

    #[tokio::test]
    #[ignore] // Requires OPENROUTER_API_KEY and network access
    async fn test_live_completion() {
        let key = std::env::var("OPENROUTER_API_KEY").ok();
        let client = ChatClient::new(
            "https://openrouter.ai/api/v1",
            key,
            "ai21/jamba-mini-1.7",
            Duration::from_secs(60),
        )
        .unwrap();
        let completion = client
            .complete(&ChatRequest::single("Say OK", 0.0, 5))
            .await
            .unwrap();
        assert!(!completion.content.is_empty());
    }
}
