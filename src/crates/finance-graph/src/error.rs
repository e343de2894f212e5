//! Error types for the finance-agent state graph.
//!
//! `GraphError` covers the taxonomy of failures a query can encounter while
//! moving through the graph (spec-wise: tool failures, LLM failures, plan
//! validation, budget exhaustion, the graph step limit, and cancellation).
//! Node-internal failures never cross a node boundary as a panic — they are
//! always converted to one of these variants or folded into a [`crate::state::StepResult`].

use thiserror::Error;

/// Convenience result type using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

/// All errors that can occur while building or running the graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A `DATA` step's tool invocation failed. Captured into
    /// `StepResult.error` by the `StepExecutor`; never propagated raw.
    #[error("tool '{tool}' invocation failed: {message}")]
    ToolInvocationFailure { tool: String, message: String },

    /// An LLM call failed inside a node. Each node applies its own
    /// fallback (see spec §4) rather than letting this escape.
    #[error("LLM call failed in node '{node}': {message}")]
    LLMCallFailure { node: String, message: String },

    /// The Decomposer could not produce or validate a plan after a
    /// re-prompt; the node still progresses with a degenerate plan, but
    /// this variant is logged as the reason.
    #[error("plan validation failed: {0}")]
    PlanValidationFailure(String),

    /// A retry or replan budget was exhausted. This is not surfaced to
    /// the caller — the Verifier overrides its verdict to `ok` and
    /// execution continues — but it is logged and recorded in
    /// `VerificationResult.reason`.
    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    /// The hard cap on total graph-node transitions (default 50) was
    /// exceeded. The engine aborts the query; `Engine::run` returns this
    /// instead of invoking `OutputFormatter`.
    #[error("graph step limit of {limit} exceeded")]
    GraphStepLimitExceeded { limit: usize },

    /// The query was cancelled. Execution short-circuits to `END`
    /// without running the formatter.
    #[error("query cancelled")]
    Cancelled,

    /// Graph or step construction is structurally invalid (used at
    /// build time, e.g. an invariant from spec §3 was violated).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A `serde_json` (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is missing or malformed (e.g. an `EngineConfig`
    /// knob outside its valid range).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GraphError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::ToolInvocationFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn llm(node: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::LLMCallFailure {
            node: node.into(),
            message: message.into(),
        }
    }

    /// `true` for the two terminal conditions that end a query without
    /// producing a normal `OutputFormatter` artifact (spec §7).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GraphError::GraphStepLimitExceeded { .. } | GraphError::Cancelled
        )
    }
}
