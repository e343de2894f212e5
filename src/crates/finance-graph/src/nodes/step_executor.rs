//! `StepExecutor` (spec §4.4): executes exactly one step — the step at
//! `current_step_index`, or the Verifier's `retry_step` if present — and
//! never advances the index.

use std::collections::HashMap;

use finance_tooling::async_utils::timeout::with_timeout;
use serde_json::Value;

use crate::error::Result;
use crate::llm::ChatRequest;
use crate::state::{DecompositionStep, FinanceState, StepResult, StepType};

use super::NodeContext;

/// Per-dependency byte budget when rendering prior results into an
/// `ANALYSIS` step's prompt (spec §4.4: "elide values that exceed a
/// per-dependency byte budget").
const DEPENDENCY_BYTE_BUDGET: usize = 4096;

const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a financial analyst. Use the provided data to answer the analysis prompt precisely.";

pub async fn run(ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    let Some(step) = state.step_to_execute() else {
        state.log("StepExecutor", "no step to execute");
        return Ok(());
    };

    let result = match step.step_type {
        StepType::Data => execute_data_step(ctx, &step).await,
        StepType::Analysis => execute_analysis_step(ctx, state, &step).await,
    };

    state.log(
        "StepExecutor",
        format!("step '{}' completed, success={}", step.step_id, result.success),
    );
    state.step_results.insert(step.step_id.clone(), result);
    Ok(())
}

async fn execute_data_step(ctx: &NodeContext, step: &DecompositionStep) -> StepResult {
    let tool_name = match &step.tool_name {
        Some(name) => name.as_str(),
        None => return StepResult::data_failure(&step.step_id, "step has no tool_name"),
    };
    let parameters = step.parameters.clone().unwrap_or_default();

    let outcome = with_timeout(ctx.config.call_timeout, ctx.tools.invoke(tool_name, parameters)).await;
    match outcome {
        Ok(value) => {
            let serialized = serde_json::to_vec(&value).unwrap_or_default();
            let truncated = serialized.len() > ctx.config.tool_result_size_cap_bytes;
            // Computed from the original value, before any truncation
            // stand-in replaces it with an opaque string.
            let data_keys = value
                .as_object()
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default();
            let stored = if truncated {
                truncate_value(&value, ctx.config.tool_result_size_cap_bytes)
            } else {
                value
            };
            StepResult::data_success(&step.step_id, stored, data_keys, truncated)
        }
        // Tool exceptions never propagate (spec §4.4): always a
        // success=false StepResult, never a raised error.
        Err(err) => StepResult::data_failure(&step.step_id, err.to_string()),
    }
}

/// Truncation for results that exceed the configured size cap: keep the
/// serialized JSON text up to the cap so the verifier can still
/// introspect a prefix, with a marker appended.
fn truncate_value(value: &Value, cap_bytes: usize) -> Value {
    let serialized = serde_json::to_string(value).unwrap_or_default();
    let mut truncated: String = serialized.chars().take(cap_bytes).collect();
    truncated.push_str("...<truncated>");
    Value::String(truncated)
}

async fn execute_analysis_step(ctx: &NodeContext, state: &FinanceState, step: &DecompositionStep) -> StepResult {
    let Some(analysis_prompt) = &step.analysis_prompt else {
        return StepResult::analysis_failure(&step.step_id, "step has no analysis_prompt");
    };

    let dependency_results = state.results_for(&step.depends_on);
    let rendered = render_dependencies(&dependency_results);
    let user_prompt = format!("{analysis_prompt}\n\nGathered data:\n{rendered}");

    let request = ChatRequest::new(ANALYSIS_SYSTEM_PROMPT, user_prompt)
        .with_temperature(0.3)
        .with_max_tokens(2048);

    match with_timeout(ctx.config.call_timeout, ctx.llm.complete(request)).await {
        Ok(text) => StepResult::analysis_success(&step.step_id, text),
        Err(err) => StepResult::analysis_failure(&step.step_id, err.to_string()),
    }
}

fn render_dependencies(results: &[(&str, &StepResult)]) -> String {
    let mut rendered = String::new();
    for (id, result) in results {
        let body = if !result.success {
            result.error.clone().unwrap_or_else(|| "unknown error".to_string())
        } else {
            match result.step_type {
                StepType::Data => result
                    .data
                    .as_ref()
                    .map(|v| elide(&v.to_string(), DEPENDENCY_BYTE_BUDGET))
                    .unwrap_or_default(),
                StepType::Analysis => result
                    .analysis_full
                    .as_deref()
                    .map(|s| elide(s, DEPENDENCY_BYTE_BUDGET))
                    .unwrap_or_default(),
            }
        };
        rendered.push_str(&format!("- {id}: {body}\n"));
    }
    rendered
}

fn elide(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(budget).collect();
        truncated.push_str("...<elided>");
        truncated
    }
}
