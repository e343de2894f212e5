//! Safety budgets: the hard caps that override LLM verdicts (spec §4.5).
//!
//! Where the teacher's `RetryPolicy` computed a backoff delay for transient
//! I/O failures, this module's [`EngineConfig`] just enforces three integer
//! ceilings against the counters living in [`crate::state::FinanceState`].
//! There is no backoff here — a `needs_more_data` or `replan` verdict either
//! fits inside its budget or is force-overridden to `ok`, synchronously, no
//! sleep involved.

use std::time::Duration;

use crate::state::{FinanceState, VerificationResult, Verdict};

/// Configurable knobs for a single engine instance. Builder-style, in the
/// teacher's `RetryPolicy::new().with_*()` idiom.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max `needs_more_data` verdicts allowed per step before it is forced
    /// to `ok` (spec §4.5 table: default 2).
    pub retry_budget: u32,
    /// Max `replan` verdicts allowed across a whole query (default 1).
    pub replan_budget: u32,
    /// Max node transitions for a single query before the engine aborts
    /// with `GraphError::GraphStepLimitExceeded` (default 50).
    pub graph_step_limit: usize,
    /// Max concurrently in-flight queries (default 1; concurrency is
    /// across queries, never within one — spec §5).
    pub max_concurrent_queries: usize,
    /// Tool results larger than this are truncated before being folded
    /// into `StepResult.data` (spec §12 supplemented feature, default
    /// 262_144 bytes).
    pub tool_result_size_cap_bytes: usize,
    /// Per-call timeout for LLM and tool invocations (spec §5, default 60s).
    pub call_timeout: Duration,
    /// The single configuration point selecting which model every node
    /// uses (spec §9 "Reflective model selection" redesign flag).
    pub llm_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            retry_budget: 2,
            replan_budget: 1,
            graph_step_limit: 50,
            max_concurrent_queries: 1,
            tool_result_size_cap_bytes: 262_144,
            call_timeout: Duration::from_secs(60),
            llm_model: "claude-3-5-sonnet-latest".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn with_replan_budget(mut self, budget: u32) -> Self {
        self.replan_budget = budget;
        self
    }

    pub fn with_graph_step_limit(mut self, limit: usize) -> Self {
        self.graph_step_limit = limit;
        self
    }

    pub fn with_max_concurrent_queries(mut self, n: usize) -> Self {
        self.max_concurrent_queries = n;
        self
    }

    pub fn with_tool_result_size_cap_bytes(mut self, cap: usize) -> Self {
        self.tool_result_size_cap_bytes = cap;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }
}

/// Applies the safety-budget overrides to a freshly produced verification
/// result (spec §4.5): a `needs_more_data` verdict whose step has already
/// exhausted `retry_budget`, or a `replan` verdict once `replan_budget` is
/// spent, is forced to `ok` with a reason suffix explaining why.
///
/// Must run before the result is written back to `state.last_verification`
/// so [`crate::graph::route_after_verification`] only ever sees the
/// post-override verdict.
pub fn enforce_budgets(state: &FinanceState, mut result: VerificationResult, config: &EngineConfig) -> VerificationResult {
    match result.verdict {
        Verdict::NeedsMoreData => {
            let step_id = state.current_step().map(|s| s.step_id.as_str()).unwrap_or("");
            let used = state.retry_count.get(step_id).copied().unwrap_or(0);
            if used >= config.retry_budget {
                result.verdict = Verdict::Ok;
                result.retry_step = None;
                result.reason = format!("{} [retry budget exhausted]", result.reason);
            }
        }
        Verdict::Replan => {
            if state.replan_count >= config.replan_budget {
                result.verdict = Verdict::Ok;
                result.reason = format!("{} [replan budget exhausted]", result.reason);
            }
        }
        Verdict::Ok => {}
    }
    result
}
