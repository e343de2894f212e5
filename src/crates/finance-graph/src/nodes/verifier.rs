//! `Verifier` (spec §4.5): the quality-control heart of the engine.
//! Always performs an LLM call — no shortcircuit on `success=true`,
//! because a tool can succeed with unusable data — then applies the
//! hard safety budgets that override whatever the LLM decided.

use serde::Deserialize;

use crate::budget::enforce_budgets;
use crate::error::Result;
use crate::llm::ChatRequest;
use crate::state::{DecompositionStep, FinanceState, StepResult, Verdict, VerificationResult};

use super::NodeContext;

const SYSTEM_PROMPT: &str = "You are a strict quality-control reviewer for a financial-analysis \
pipeline. Given a step's description, its result, and the overall query, decide one of three \
verdicts: 'ok' (the result is usable), 'needs_more_data' (retry the same step with adjusted \
parameters or prompt), or 'replan' (the whole plan is wrong, e.g. wrong ticker). Respond with \
JSON: {\"verdict\": \"ok\"|\"needs_more_data\"|\"replan\", \"reason\": string, \
\"retry_parameters\": object or null, \"retry_analysis_prompt\": string or null}.";

#[derive(Debug, Deserialize)]
struct VerdictResponse {
    verdict: String,
    reason: String,
    #[serde(default)]
    retry_parameters: Option<std::collections::HashMap<String, serde_json::Value>>,
    #[serde(default)]
    retry_analysis_prompt: Option<String>,
}

pub async fn run(ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    let Some(step) = state.current_step().cloned() else {
        state.last_verification = Some(VerificationResult::ok("no step to verify"));
        return Ok(());
    };
    let Some(result) = state.step_results.get(&step.step_id).cloned() else {
        state.last_verification = Some(VerificationResult::ok("no result recorded for step"));
        return Ok(());
    };

    let raw_verdict = request_verdict(ctx, state, &step, &result).await;
    let budgeted = enforce_budgets(state, raw_verdict, &ctx.config);
    apply_counters(state, &step.step_id, &budgeted);

    state.log(
        "Verifier",
        format!("step '{}' verdict={:?} reason={}", step.step_id, budgeted.verdict, budgeted.reason),
    );
    state.last_verification = Some(budgeted);
    Ok(())
}

async fn request_verdict(
    ctx: &NodeContext,
    state: &FinanceState,
    step: &DecompositionStep,
    result: &StepResult,
) -> VerificationResult {
    let prompt = format!(
        "Query: {}\nStep: {} ({:?})\nDescription: {}\nSuccess: {}\nError: {}\nResult keys: {:?}\n",
        state.query,
        step.step_id,
        step.step_type,
        step.description,
        result.success,
        result.error.as_deref().unwrap_or("none"),
        result.data_keys,
    );
    let request = ChatRequest::new(SYSTEM_PROMPT, prompt)
        .with_temperature(0.0)
        .with_max_tokens(512);

    let raw = match ctx.llm.complete(request).await {
        Ok(raw) => raw,
        // A failed LLM call here has nowhere safe to fall back to but
        // `ok` — the step already has a recorded result either way, and
        // forcing another verdict would need another LLM call.
        Err(err) => {
            return VerificationResult::ok(format!("verifier LLM call failed ({err}), accepting result as-is"));
        }
    };

    match parse_verdict(&raw, step) {
        Ok(v) => v,
        Err(parse_err) => VerificationResult::ok(format!(
            "verifier response unparseable ({parse_err}), accepting result as-is"
        )),
    }
}

fn parse_verdict(raw: &str, step: &DecompositionStep) -> std::result::Result<VerificationResult, String> {
    let json_span = extract_json_object(raw);
    let parsed: VerdictResponse = serde_json::from_str(json_span).map_err(|e| e.to_string())?;

    match parsed.verdict.as_str() {
        "ok" => Ok(VerificationResult::ok(parsed.reason)),
        "needs_more_data" => {
            let mut retry_step = step.clone();
            if let Some(params) = parsed.retry_parameters {
                retry_step.parameters = Some(params);
            }
            if let Some(prompt) = parsed.retry_analysis_prompt {
                retry_step.analysis_prompt = Some(prompt);
            }
            Ok(VerificationResult::needs_more_data(parsed.reason, retry_step))
        }
        "replan" => Ok(VerificationResult::replan(parsed.reason)),
        other => Err(format!("unknown verdict '{other}'")),
    }
}

fn extract_json_object(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return trimmed;
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Increments the counters only for verdicts that survived budget
/// enforcement unchanged (spec §8 invariant 3: counters never exceed
/// their budget).
fn apply_counters(state: &mut FinanceState, step_id: &str, result: &VerificationResult) {
    match result.verdict {
        Verdict::NeedsMoreData => {
            *state.retry_count.entry(step_id.to_string()).or_insert(0) += 1;
        }
        Verdict::Replan => {
            state.replan_count += 1;
        }
        Verdict::Ok => {}
    }
}
