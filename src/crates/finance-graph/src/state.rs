//! The typed decomposition-step model and the shared execution state
//! (spec §3). Every entity here is a value type with explicit invariants;
//! the runtime never mutates a shared entity concurrently from two nodes —
//! ownership transfers with control flow (spec §5).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `DATA` steps invoke a registered tool; `ANALYSIS` steps send a prompt
/// (plus gathered dependency results) to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Data,
    Analysis,
}

/// One unit of a decomposition plan.
///
/// Invariants (enforced by [`crate::nodes::decomposer`] validation and
/// exercised in this module's tests):
/// - `tool_name`/`parameters` are `Some` iff `step_type == Data`.
/// - `analysis_prompt` is `Some` iff `step_type == Analysis`.
/// - every id in `depends_on` names an earlier step in the same plan.
/// - the final step of a plan has `step_id == "final_synthesis"` and
///   `step_type == Analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionStep {
    pub step_id: String,
    pub step_type: StepType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_prompt: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl DecompositionStep {
    pub const FINAL_SYNTHESIS_ID: &'static str = "final_synthesis";

    pub fn is_final_synthesis(&self) -> bool {
        self.step_id == Self::FINAL_SYNTHESIS_ID && self.step_type == StepType::Analysis
    }

    /// Structural self-check independent of the rest of the plan (tool
    /// existence and cross-step dependency ordering are checked by the
    /// Decomposer, which has the full plan in view).
    pub fn validate_shape(&self) -> Result<(), String> {
        match self.step_type {
            StepType::Data => {
                if self.tool_name.is_none() {
                    return Err(format!("step '{}': DATA step missing tool_name", self.step_id));
                }
                if self.parameters.is_none() {
                    return Err(format!(
                        "step '{}': DATA step missing parameters",
                        self.step_id
                    ));
                }
            }
            StepType::Analysis => {
                if self.analysis_prompt.is_none() {
                    return Err(format!(
                        "step '{}': ANALYSIS step missing analysis_prompt",
                        self.step_id
                    ));
                }
            }
        }
        Ok(())
    }
}

/// What a `StepExecutor` produces for one step (spec §3: tagged by
/// `step_type`; a failure is a `success=false` result with a populated
/// `error`, never an exception crossing the node boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub step_type: StepType,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub produced_at: DateTime<Utc>,

    /// Present when `step_type == Data && success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_size: Option<usize>,
    #[serde(default)]
    pub truncated: bool,

    /// Present when `step_type == Analysis && success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_full: Option<String>,
}

fn object_keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

impl StepResult {
    /// `data` is the value actually stored (which may already be a
    /// truncated stand-in); `data_keys` must be computed by the caller
    /// from the original, untruncated tool result. The verifier relies on
    /// `data_keys` for introspection (spec.md:61), precisely in the
    /// large-payload case where `data` itself has been replaced.
    pub fn data_success(
        step_id: impl Into<String>,
        data: Value,
        data_keys: Vec<String>,
        truncated: bool,
    ) -> Self {
        let serialized = serde_json::to_string(&data).unwrap_or_default();
        StepResult {
            step_id: step_id.into(),
            step_type: StepType::Data,
            success: true,
            error: None,
            produced_at: Utc::now(),
            data: Some(data),
            data_keys,
            data_size: Some(serialized.len()),
            truncated,
            analysis_full: None,
        }
    }

    /// Convenience for callers with an untruncated value: derives
    /// `data_keys` from the value's own top-level object keys.
    pub fn data_success_from(step_id: impl Into<String>, data: Value) -> Self {
        let data_keys = object_keys(&data);
        Self::data_success(step_id, data, data_keys, false)
    }

    pub fn data_failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        StepResult {
            step_id: step_id.into(),
            step_type: StepType::Data,
            success: false,
            error: Some(error.into()),
            produced_at: Utc::now(),
            data: None,
            data_keys: Vec::new(),
            data_size: None,
            truncated: false,
            analysis_full: None,
        }
    }

    pub fn analysis_success(step_id: impl Into<String>, analysis_full: impl Into<String>) -> Self {
        StepResult {
            step_id: step_id.into(),
            step_type: StepType::Analysis,
            success: true,
            error: None,
            produced_at: Utc::now(),
            data: None,
            data_keys: Vec::new(),
            data_size: None,
            truncated: false,
            analysis_full: Some(analysis_full.into()),
        }
    }

    pub fn analysis_failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        StepResult {
            step_id: step_id.into(),
            step_type: StepType::Analysis,
            success: false,
            error: Some(error.into()),
            produced_at: Utc::now(),
            data: None,
            data_keys: Vec::new(),
            data_size: None,
            truncated: false,
            analysis_full: None,
        }
    }
}

/// The Verifier's three-way decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Ok,
    NeedsMoreData,
    Replan,
}

/// The Verifier's output: a verdict plus the free-text reason the
/// Decomposer is fed on `replan`, or the modified step to retry with on
/// `needs_more_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verdict: Verdict,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_step: Option<DecompositionStep>,
}

impl VerificationResult {
    pub fn ok(reason: impl Into<String>) -> Self {
        VerificationResult {
            verdict: Verdict::Ok,
            reason: reason.into(),
            retry_step: None,
        }
    }

    pub fn needs_more_data(reason: impl Into<String>, retry_step: DecompositionStep) -> Self {
        VerificationResult {
            verdict: Verdict::NeedsMoreData,
            reason: reason.into(),
            retry_step: Some(retry_step),
        }
    }

    pub fn replan(reason: impl Into<String>) -> Self {
        VerificationResult {
            verdict: Verdict::Replan,
            reason: reason.into(),
            retry_step: None,
        }
    }
}

/// `QueryRouter`'s classification of the incoming query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Financial,
    NonFinancial,
}

/// The single object threaded through the graph for one query. Created at
/// `START`, mutated only by the currently executing node, and read by an
/// external observer (or discarded) once `END` is reached — there is no
/// cross-query persistence (spec §1 Non-goals, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceState {
    pub query: String,
    pub query_type: Option<QueryType>,
    pub direct_response: Option<String>,

    pub steps: Vec<DecompositionStep>,
    pub current_step_index: usize,
    pub step_results: HashMap<String, StepResult>,

    pub retry_count: HashMap<String, u32>,
    pub replan_count: u32,
    pub last_verification: Option<VerificationResult>,
    pub decomposition_reasoning: Option<String>,

    pub raw_analysis: Option<String>,
    pub structured_output: Option<Value>,
    pub typescript_component: Option<String>,

    pub debug_messages: Vec<String>,

    /// Total node transitions so far, enforced against
    /// `EngineConfig::graph_step_limit` (spec §4.5 safety budgets table).
    #[serde(default)]
    pub graph_steps_taken: usize,
}

impl FinanceState {
    pub fn new(query: impl Into<String>) -> Self {
        FinanceState {
            query: query.into(),
            query_type: None,
            direct_response: None,
            steps: Vec::new(),
            current_step_index: 0,
            step_results: HashMap::new(),
            retry_count: HashMap::new(),
            replan_count: 0,
            last_verification: None,
            decomposition_reasoning: None,
            raw_analysis: None,
            structured_output: None,
            typescript_component: None,
            debug_messages: Vec::new(),
            graph_steps_taken: 0,
        }
    }

    pub fn log(&mut self, node: &str, message: impl Into<String>) {
        let line = format!("[{node}] {}", message.into());
        tracing::debug!(node, "{}", line);
        self.debug_messages.push(line);
    }

    pub fn current_step(&self) -> Option<&DecompositionStep> {
        self.steps.get(self.current_step_index)
    }

    /// The step actually due for execution: the Verifier's `retry_step`
    /// takes precedence over `steps[current_step_index]` (spec §4.4), but
    /// only for one pass — callers consume `last_verification` themselves.
    pub fn step_to_execute(&self) -> Option<DecompositionStep> {
        if let Some(v) = &self.last_verification {
            if let Some(retry) = &v.retry_step {
                return Some(retry.clone());
            }
        }
        self.current_step().cloned()
    }

    /// Every step's plan-dependencies have a produced result already
    /// (spec §5 ordering guarantee); used by the `StepExecutor` to gather
    /// `ANALYSIS` step inputs.
    pub fn results_for(&self, step_ids: &[String]) -> Vec<(&str, &StepResult)> {
        step_ids
            .iter()
            .filter_map(|id| self.step_results.get(id).map(|r| (id.as_str(), r)))
            .collect()
    }

    /// Reset retry counters for the new plan: every step_id in `self.steps`
    /// gets an explicit 0, including ids that survived the replan (e.g.
    /// `final_synthesis`, which is present in every plan), not just ids
    /// newly introduced by it (invariant 6, spec §8).
    pub fn reset_retry_counts_for_new_plan(&mut self) {
        self.retry_count = self
            .steps
            .iter()
            .map(|s| (s.step_id.clone(), 0))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_step_requires_tool_and_parameters() {
        let step = DecompositionStep {
            step_id: "s1".into(),
            step_type: StepType::Data,
            description: "fetch".into(),
            tool_name: None,
            parameters: None,
            analysis_prompt: None,
            depends_on: vec![],
        };
        assert!(step.validate_shape().is_err());
    }

    #[test]
    fn analysis_step_requires_prompt() {
        let step = DecompositionStep {
            step_id: "final_synthesis".into(),
            step_type: StepType::Analysis,
            description: "synthesize".into(),
            tool_name: None,
            parameters: None,
            analysis_prompt: None,
            depends_on: vec![],
        };
        assert!(step.validate_shape().is_err());
        assert!(step.is_final_synthesis()); // id/type match even though shape is invalid
    }

    #[test]
    fn retry_step_takes_precedence_over_current_index() {
        let mut state = FinanceState::new("q");
        let original = DecompositionStep {
            step_id: "s1".into(),
            step_type: StepType::Data,
            description: "orig".into(),
            tool_name: Some("price".into()),
            parameters: Some(HashMap::new()),
            analysis_prompt: None,
            depends_on: vec![],
        };
        let mut retry = original.clone();
        retry.description = "retry".into();
        state.steps = vec![original];
        state.last_verification = Some(VerificationResult::needs_more_data("x", retry));

        let to_execute = state.step_to_execute().unwrap();
        assert_eq!(to_execute.description, "retry");
    }

    #[test]
    fn reset_retry_counts_drops_stale_ids_and_seeds_new_ones() {
        let mut state = FinanceState::new("q");
        state.retry_count.insert("stale".into(), 2);
        state.steps = vec![DecompositionStep {
            step_id: "fresh".into(),
            step_type: StepType::Analysis,
            description: "d".into(),
            tool_name: None,
            parameters: None,
            analysis_prompt: Some("p".into()),
            depends_on: vec![],
        }];
        state.reset_retry_counts_for_new_plan();
        assert!(!state.retry_count.contains_key("stale"));
        assert_eq!(state.retry_count.get("fresh"), Some(&0));
    }

    #[test]
    fn reset_retry_counts_zeroes_surviving_ids_too() {
        let mut state = FinanceState::new("q");
        state.retry_count.insert("final_synthesis".into(), 2);
        state.retry_count.insert("price".into(), 1);
        state.steps = vec![
            DecompositionStep {
                step_id: "price".into(),
                step_type: StepType::Data,
                description: "d".into(),
                tool_name: Some("get_current_price".into()),
                parameters: Some(HashMap::new()),
                analysis_prompt: None,
                depends_on: vec![],
            },
            DecompositionStep {
                step_id: "final_synthesis".into(),
                step_type: StepType::Analysis,
                description: "s".into(),
                tool_name: None,
                parameters: None,
                analysis_prompt: Some("p".into()),
                depends_on: vec!["price".into()],
            },
        ];
        state.reset_retry_counts_for_new_plan();
        assert_eq!(state.retry_count.get("final_synthesis"), Some(&0));
        assert_eq!(state.retry_count.get("price"), Some(&0));
    }
}
