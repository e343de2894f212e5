//! `QueryRouter` (spec §4.1): classifies the query as `financial` or
//! `non_financial`. Must not call any tool; deterministic on identical
//! LLM output; no retries.

use crate::error::Result;
use crate::llm::ChatRequest;
use crate::state::{FinanceState, QueryType};

use super::NodeContext;

const SYSTEM_PROMPT: &str = "You classify whether a user question requires \
financial/equity-market data analysis. Reply with exactly one word: \
'financial' or 'nonfinancial'.";

pub async fn run(ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    let request = ChatRequest::new(SYSTEM_PROMPT, state.query.clone())
        .with_temperature(0.0)
        .with_max_tokens(8);

    match ctx.llm.complete(request).await {
        Ok(text) => {
            // Permissive fallback (spec §4.1): anything other than the
            // affirmative token is non_financial.
            let query_type = if text.trim().to_lowercase().starts_with("financial") {
                QueryType::Financial
            } else {
                QueryType::NonFinancial
            };
            state.log("QueryRouter", format!("classified '{:?}' from response {:?}", query_type, text.trim()));
            state.query_type = Some(query_type);
        }
        Err(err) => {
            state.log("QueryRouter", format!("LLM call failed ({err}), defaulting to financial"));
            state.query_type = Some(QueryType::Financial);
        }
    }
    Ok(())
}
