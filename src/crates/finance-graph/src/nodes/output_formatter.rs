//! `OutputFormatter` (spec §4.7): runs once at the end of every path and
//! produces a structured artifact plus, best-effort, a renderable UI
//! component.

use crate::error::Result;
use crate::llm::ChatRequest;
use crate::output::StructuredOutput;
use crate::state::{FinanceState, StepType};

use super::NodeContext;

const STRUCTURE_SYSTEM_PROMPT: &str = "You produce a structured financial analysis result as \
JSON with fields: summary (string), content_blocks (array of tagged objects with 'type' one of \
metric/table/chart/comparison/insight/text and type-appropriate fields), key_insights (array of \
strings), recommendations (array of strings), metadata (object). Respond with JSON only.";

const COMPONENT_SYSTEM_PROMPT: &str =
    "You write a single self-contained UI component that renders the given structured financial \
analysis result. Respond with source code only, no explanation.";

pub async fn run(ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    let content_source = select_content_source(state);

    let structured = if all_steps_failed(state) {
        // Hard guarantee (spec §7/§8): when every step failed, the summary
        // must read "No reliable data was obtainable." as a code invariant,
        // not merely as whatever the LLM happened to write.
        state.log("OutputFormatter", "all steps failed, forcing no-data fallback summary");
        StructuredOutput::fallback_text(fallback_summary(state), content_source.clone())
    } else {
        match request_structured_output(ctx, &state.query, &content_source).await {
            Ok(output) => output,
            Err(parse_err) => {
                state.log("OutputFormatter", format!("structuring failed ({parse_err}), using fallback"));
                StructuredOutput::fallback_text(fallback_summary(state), content_source.clone())
            }
        }
    };

    let structured_value = serde_json::to_value(&structured).unwrap_or(serde_json::Value::Null);

    match request_component(ctx, &structured_value).await {
        Ok(component) => state.typescript_component = Some(component),
        Err(err) => {
            state.log("OutputFormatter", format!("UI component generation skipped ({err})"));
        }
    }

    state.structured_output = Some(structured_value);
    Ok(())
}

/// Priority order from spec §4.7: `final_synthesis` analysis text, then
/// the concatenation of all `ANALYSIS` results, then `direct_response`,
/// then empty.
fn select_content_source(state: &FinanceState) -> String {
    if let Some(result) = state.step_results.get("final_synthesis") {
        if let Some(text) = &result.analysis_full {
            return text.clone();
        }
    }

    let analysis_concat: String = state
        .steps
        .iter()
        .filter(|s| s.step_type == StepType::Analysis)
        .filter_map(|s| state.step_results.get(&s.step_id))
        .filter_map(|r| r.analysis_full.as_deref())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !analysis_concat.is_empty() {
        return analysis_concat;
    }

    state.direct_response.clone().unwrap_or_default()
}

/// Spec §7/§8: true when the plan had at least one step and none of them
/// succeeded.
fn all_steps_failed(state: &FinanceState) -> bool {
    !state.steps.is_empty() && !state.step_results.values().any(|r| r.success)
}

fn fallback_summary(state: &FinanceState) -> String {
    if all_steps_failed(state) {
        "No reliable data was obtainable.".to_string()
    } else {
        "Analysis complete.".to_string()
    }
}

async fn request_structured_output(
    ctx: &NodeContext,
    query: &str,
    content: &str,
) -> std::result::Result<StructuredOutput, String> {
    let prompt = format!("Query: {query}\n\nAnalysis content:\n{content}");
    let request = ChatRequest::new(STRUCTURE_SYSTEM_PROMPT, prompt)
        .with_temperature(0.2)
        .with_max_tokens(2048);

    let raw = ctx.llm.complete(request).await.map_err(|e| e.to_string())?;
    let json_span = extract_json_object(&raw);
    serde_json::from_str(json_span).map_err(|e| e.to_string())
}

async fn request_component(ctx: &NodeContext, structured: &serde_json::Value) -> std::result::Result<String, String> {
    let prompt = format!("Structured result:\n{structured}");
    let request = ChatRequest::new(COMPONENT_SYSTEM_PROMPT, prompt)
        .with_temperature(0.2)
        .with_max_tokens(2048);
    ctx.llm.complete(request).await.map_err(|e| e.to_string())
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
