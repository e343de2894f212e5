//! The LLM interface (spec §6): "a single client that accepts
//! `(system_prompt, user_prompt, temperature, max_tokens)` and returns a
//! text completion. Nodes do not pick providers; a single configuration
//! point selects the model."
//!
//! This is deliberately narrower than the teacher's `ChatModel`, which
//! carried multi-turn message history, streaming, reasoning-mode
//! configuration and bound tool definitions for native function-calling.
//! None of the five nodes that call an LLM (`QueryRouter`, `DirectResponse`,
//! `Decomposer`, `StepExecutor`'s analysis steps, `Verifier`) need
//! multi-turn history or provider-native tool calls — each call is a
//! single system/user prompt pair, and tool dispatch is the engine's own
//! `ToolRegistry`, not the model's. `Arc<dyn ChatModel>` is still injected
//! once at construction (never looked up through a global), which is the
//! fix for the "reflective model selection" redesign flag (spec §9).

use async_trait::async_trait;

use crate::error::Result;

/// One chat-completion request: no history, no streaming, no tool
/// binding. `max_tokens` bounds the completion length; `temperature`
/// controls sampling. Nodes build one of these per LLM call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        ChatRequest {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Provider-agnostic chat-completion client. Implementations handle
/// authentication, request translation, and rate limiting for their
/// particular vendor; `finance-llm::remote::claude` is the concrete
/// binding shipped with this workspace.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Runs one completion and returns the model's raw text output.
    /// Implementations should return `GraphError::LLMCallFailure` on
    /// network failure, authentication failure, or an empty response.
    async fn complete(&self, request: ChatRequest) -> Result<String>;
}
