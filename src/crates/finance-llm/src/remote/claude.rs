//! Anthropic Claude client implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use finance_llm::config::RemoteLlmConfig;
//! use finance_llm::remote::ClaudeClient;
//! use finance_graph::llm::{ChatModel, ChatRequest};
//!
//! let config = RemoteLlmConfig::from_env(
//!     "ANTHROPIC_API_KEY",
//!     "https://api.anthropic.com",
//!     "claude-3-5-sonnet-latest",
//! )?;
//! let client = ClaudeClient::new(config);
//! let text = client.complete(ChatRequest::new("You are terse.", "Hello!")).await?;
//! ```

use crate::config::RemoteLlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use finance_graph::error::Result as GraphResult;
use finance_graph::llm::{ChatModel, ChatRequest};
use finance_tooling::async_utils::retry::{with_retry, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude API client implementing the engine's minimal `ChatModel`
/// contract: one system prompt, one user prompt, one completion.
#[derive(Clone)]
pub struct ClaudeClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl ClaudeClient {
    pub fn new(config: RemoteLlmConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest client");

        Self { config, client }
    }
}

#[async_trait]
impl ChatModel for ClaudeClient {
    async fn complete(&self, request: ChatRequest) -> GraphResult<String> {
        let policy = RetryPolicy::new(self.config.max_retries as usize + 1).with_initial_interval(0.5);

        with_retry(&policy, || self.send_once(&request))
            .await
            .map_err(Into::into)
    }
}

impl ClaudeClient {
    /// One HTTP round-trip to the Messages API. `complete` wraps this in
    /// `finance_tooling`'s retry policy with exponential backoff.
    async fn send_once(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/messages", self.config.base_url);

        let body = ClaudeRequest {
            model: self.config.model.clone(),
            system: Some(request.system_prompt.clone()),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: request.user_prompt.clone(),
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(LlmError::HttpError)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status.as_u16() == 401 {
                LlmError::AuthenticationError(error_text)
            } else if status.as_u16() == 429 {
                LlmError::RateLimitExceeded(error_text)
            } else {
                LlmError::ProviderError(format!("Claude API error {}: {}", status, error_text))
            });
        }

        let claude_resp: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = claude_resp
            .content
            .into_iter()
            .filter_map(|c| if c.content_type == "text" { c.text } else { None })
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_does_not_panic() {
        let config = RemoteLlmConfig::new("test-key", "https://api.anthropic.com", "claude-3-5-sonnet-latest");
        let _client = ClaudeClient::new(config);
    }

    #[test]
    fn response_text_is_joined_from_text_blocks() {
        let raw = r#"{"content": [{"type": "text", "text": "hello "}, {"type": "text", "text": "world"}]}"#;
        let resp: ClaudeResponse = serde_json::from_str(raw).unwrap();
        let text: String = resp
            .content
            .into_iter()
            .filter_map(|c| if c.content_type == "text" { c.text } else { None })
            .collect();
        assert_eq!(text, "hello world");
    }
}
