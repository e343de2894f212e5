//! `Decomposer` (spec §4.3): turns a financial query into an ordered
//! plan of typed steps; also invoked to replan after a `replan` verdict.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::llm::ChatRequest;
use crate::state::{DecompositionStep, FinanceState, StepType, Verdict};
use crate::tool::validate_parameters;

use super::NodeContext;

const SYSTEM_PROMPT: &str = "You are a financial-analysis planner. Given a user query, likely \
ticker subjects, and a catalog of available tools, produce an ordered JSON array of steps. \
Each step is an object with: step_id (string), step_type ('data' or 'analysis'), description, \
tool_name and parameters (for 'data' steps), analysis_prompt (for 'analysis' steps), and \
depends_on (array of earlier step_ids). The last step must have step_id 'final_synthesis', \
step_type 'analysis', and depend on every earlier step. Respond with JSON only, no prose.";

/// Mirrors [`DecompositionStep`] for deserialization so a malformed LLM
/// response fails to parse rather than silently producing a shape that
/// skips `validate_shape`.
#[derive(Debug, Deserialize)]
struct PlannedStep {
    step_id: String,
    step_type: StepType,
    description: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    parameters: Option<HashMap<String, Value>>,
    #[serde(default)]
    analysis_prompt: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl From<PlannedStep> for DecompositionStep {
    fn from(p: PlannedStep) -> Self {
        DecompositionStep {
            step_id: p.step_id,
            step_type: p.step_type,
            description: p.description,
            tool_name: p.tool_name,
            parameters: p.parameters,
            analysis_prompt: p.analysis_prompt,
            depends_on: p.depends_on,
        }
    }
}

pub async fn run(ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    let tickers = ctx.ticker_extractor.extract_tickers(&state.query).await;
    state.log("Decomposer", format!("ticker hints: {tickers:?}"));

    let base_prompt = build_prompt(&state.query, &tickers, &ctx.tools.catalog_for_prompt(), state);

    let plan = match request_plan(ctx, &base_prompt).await {
        Ok(plan) => plan,
        Err(first_error) => {
            state.log("Decomposer", format!("plan validation failed: {first_error}; re-prompting"));
            let reprompt = format!(
                "{base_prompt}\n\nYour previous plan was invalid for this reason: {first_error}\n\
                 Return a corrected JSON array only.",
            );
            match request_plan(ctx, &reprompt).await {
                Ok(plan) => plan,
                Err(second_error) => {
                    state.log(
                        "Decomposer",
                        format!("second plan also invalid ({second_error}); falling back to degenerate plan"),
                    );
                    degenerate_plan(&ctx.tools, &tickers)
                }
            }
        }
    };

    state.decomposition_reasoning = Some(format!(
        "planned {} step(s) for query {:?} (tickers: {tickers:?})",
        plan.len(),
        state.query
    ));
    state.steps = plan;
    state.current_step_index = 0;
    state.reset_retry_counts_for_new_plan();
    Ok(())
}

fn build_prompt(query: &str, tickers: &[String], catalog: &str, state: &FinanceState) -> String {
    let mut prompt = format!(
        "Query: {query}\nLikely subjects: {tickers:?}\nAvailable tools:\n{catalog}\n"
    );
    if let Some(verification) = &state.last_verification {
        if verification.verdict == Verdict::Replan {
            prompt.push_str(&format!("\nPrior plan failed because: {}\n", verification.reason));
        }
    }
    prompt
}

async fn request_plan(ctx: &NodeContext, prompt: &str) -> std::result::Result<Vec<DecompositionStep>, String> {
    let request = ChatRequest::new(SYSTEM_PROMPT, prompt)
        .with_temperature(0.2)
        .with_max_tokens(2048);
    let raw = ctx
        .llm
        .complete(request)
        .await
        .map_err(|e| format!("LLM call failed: {e}"))?;

    let planned: Vec<PlannedStep> =
        serde_json::from_str(extract_json_array(&raw)).map_err(|e| format!("invalid JSON plan: {e}"))?;
    let mut steps: Vec<DecompositionStep> = planned.into_iter().map(Into::into).collect();

    ensure_final_synthesis(&mut steps);
    validate_plan(&ctx.tools, &steps)?;
    Ok(steps)
}

/// LLMs frequently wrap JSON in prose or code fences; take the first
/// `[...]` span if the whole response doesn't parse directly.
fn extract_json_array(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return trimmed;
    }
    match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn ensure_final_synthesis(steps: &mut Vec<DecompositionStep>) {
    if steps.last().map(|s| s.is_final_synthesis()).unwrap_or(false) {
        return;
    }
    let depends_on: Vec<String> = steps.iter().map(|s| s.step_id.clone()).collect();
    steps.push(DecompositionStep {
        step_id: DecompositionStep::FINAL_SYNTHESIS_ID.to_string(),
        step_type: StepType::Analysis,
        description: "Synthesize findings into a final answer".to_string(),
        tool_name: None,
        parameters: None,
        analysis_prompt: Some(
            "Synthesize the gathered data above into a clear, complete answer to the user's question.".to_string(),
        ),
        depends_on,
    });
}

/// Spec §4.3 point 3: tool names/parameters validated against the
/// registry, dependency graph acyclic and consistent with list order,
/// plan ends with `final_synthesis` depending (transitively) on every
/// other step (invariant 7, spec §8).
fn validate_plan(tools: &crate::tool::ToolRegistry, steps: &[DecompositionStep]) -> std::result::Result<(), String> {
    if steps.is_empty() {
        return Err("plan is empty".to_string());
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in steps {
        step.validate_shape()?;

        for dep in &step.depends_on {
            if !seen_ids.contains(dep.as_str()) {
                return Err(format!(
                    "step '{}' depends on '{dep}', which is not an earlier step",
                    step.step_id
                ));
            }
        }

        if step.step_type == StepType::Data {
            let tool_name = step.tool_name.as_deref().unwrap_or_default();
            let tool = tools
                .get(tool_name)
                .ok_or_else(|| format!("step '{}' names unregistered tool '{tool_name}'", step.step_id))?;
            let params = step.parameters.clone().unwrap_or_default();
            validate_parameters(tool_name, tool.parameter_schema(), &params)
                .map_err(|e| format!("step '{}': {e}", step.step_id))?;
        }

        seen_ids.insert(step.step_id.as_str());
    }

    let last = steps.last().unwrap();
    if !last.is_final_synthesis() {
        return Err("plan does not end with final_synthesis".to_string());
    }

    if steps.len() > 1 {
        let reachable = transitive_depends_on(steps, &last.step_id);
        for step in &steps[..steps.len() - 1] {
            if !reachable.contains(step.step_id.as_str()) {
                return Err(format!(
                    "final_synthesis does not transitively depend on step '{}'",
                    step.step_id
                ));
            }
        }
    }

    Ok(())
}

fn transitive_depends_on<'a>(steps: &'a [DecompositionStep], from: &str) -> HashSet<&'a str> {
    let by_id: HashMap<&str, &DecompositionStep> = steps.iter().map(|s| (s.step_id.as_str(), s)).collect();
    let mut visited = HashSet::new();
    let mut stack = vec![from.to_string()];
    while let Some(id) = stack.pop() {
        if let Some(step) = by_id.get(id.as_str()) {
            for dep in &step.depends_on {
                if visited.insert(dep.as_str()) {
                    stack.push(dep.clone());
                }
            }
        }
    }
    visited
}

/// Last-resort plan when re-prompting also fails to produce a valid
/// structure (spec §4.3 point 4): one `DATA` step for the most-confident
/// ticker plus `final_synthesis`. Falls back to an analysis-only plan if
/// no registered tool exists to ground the degenerate step in.
fn degenerate_plan(tools: &crate::tool::ToolRegistry, tickers: &[String]) -> Vec<DecompositionStep> {
    let ticker = tickers.first().cloned().unwrap_or_else(|| "UNKNOWN".to_string());
    let fallback_tool = tools
        .tool_names()
        .into_iter()
        .next()
        .map(|s| s.to_string());

    match fallback_tool {
        Some(tool_name) => {
            let mut parameters = HashMap::new();
            parameters.insert("ticker".to_string(), Value::String(ticker.clone()));
            vec![
                DecompositionStep {
                    step_id: "fallback_lookup".to_string(),
                    step_type: StepType::Data,
                    description: format!("Fetch data for {ticker}"),
                    tool_name: Some(tool_name),
                    parameters: Some(parameters),
                    analysis_prompt: None,
                    depends_on: vec![],
                },
                DecompositionStep {
                    step_id: DecompositionStep::FINAL_SYNTHESIS_ID.to_string(),
                    step_type: StepType::Analysis,
                    description: "Synthesize findings into a final answer".to_string(),
                    tool_name: None,
                    parameters: None,
                    analysis_prompt: Some(format!("Answer the question about {ticker} using the data above.")),
                    depends_on: vec!["fallback_lookup".to_string()],
                },
            ]
        }
        None => vec![DecompositionStep {
            step_id: DecompositionStep::FINAL_SYNTHESIS_ID.to_string(),
            step_type: StepType::Analysis,
            description: "Synthesize findings into a final answer".to_string(),
            tool_name: None,
            parameters: None,
            analysis_prompt: Some(format!("Answer the question about {ticker} from general knowledge.")),
            depends_on: vec![],
        }],
    }
}
