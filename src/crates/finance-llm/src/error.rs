//! Error types for `finance-llm`'s chat-completion clients.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur while talking to a chat-completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize a request or response body.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed (HTTP 401).
    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid response body from the provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// General provider error (any other non-2xx status).
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Configuration error (e.g. malformed base URL).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// `true` for failures worth a caller-level retry (distinct from the
    /// engine's own retry/replan budgets, which operate one layer up).
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::HttpError(_) | LlmError::RateLimitExceeded(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

/// `finance_graph::llm::ChatModel::complete` returns `finance_graph::error::Result`;
/// this lets a `ClaudeClient` use `?` against `LlmError` and fold into `GraphError`
/// at the node boundary, matching the propagation policy of spec §7.
impl From<LlmError> for finance_graph::error::GraphError {
    fn from(err: LlmError) -> Self {
        finance_graph::error::GraphError::llm("ClaudeClient", err.to_string())
    }
}
