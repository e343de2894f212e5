//! `DirectResponse` (spec §4.2): one LLM call for `non_financial`
//! queries. On LLM failure produces a fixed apology string; never raises.

use crate::error::Result;
use crate::llm::ChatRequest;
use crate::state::FinanceState;

use super::NodeContext;

const SYSTEM_PROMPT: &str =
    "You are a helpful general-purpose assistant. Answer the user's question concisely.";

const APOLOGY: &str =
    "I'm sorry, I wasn't able to generate a response right now. Please try again.";

pub async fn run(ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    let request = ChatRequest::new(SYSTEM_PROMPT, state.query.clone())
        .with_temperature(0.7)
        .with_max_tokens(512);

    let text = match ctx.llm.complete(request).await {
        Ok(text) => text,
        Err(err) => {
            state.log("DirectResponse", format!("LLM call failed ({err}), using apology"));
            APOLOGY.to_string()
        }
    };

    state.direct_response = Some(text.clone());
    state.raw_analysis = Some(text);
    Ok(())
}
