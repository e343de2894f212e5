//! The sequential executor (spec §5): walks the routing table one
//! transition at a time. Within a single query at most one node is
//! active; concurrency, if any, is the host running many `Engine::run`
//! calls concurrently, each owning its own [`FinanceState`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::budget::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::{route_after_classification, route_after_verification, GraphNode};
use crate::llm::ChatModel;
use crate::nodes::{
    advance_index, decomposer, direct_response, output_formatter, query_router, step_executor, verifier, NodeContext,
};
use crate::state::{FinanceState, QueryType};
use crate::ticker::TickerExtractor;
use crate::tool::ToolRegistry;

/// Owns the dependency-injected collaborators and runs queries against
/// the fixed graph topology of [`crate::graph`].
pub struct Engine {
    ctx: NodeContext,
}

impl Engine {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        ticker_extractor: Arc<dyn TickerExtractor>,
        config: EngineConfig,
    ) -> Self {
        Engine {
            ctx: NodeContext::new(llm, tools, ticker_extractor, config),
        }
    }

    /// Runs one query to completion. Returns the terminal `FinanceState`
    /// on success, or a `GraphError` for the two abnormal-termination
    /// conditions (spec §7): the graph step limit, or cancellation.
    pub async fn run(&self, query: impl Into<String>, cancel: &CancellationToken) -> Result<FinanceState> {
        let mut state = FinanceState::new(query);
        let mut current = GraphNode::QueryRouter;

        loop {
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }

            if state.graph_steps_taken >= self.ctx.config.graph_step_limit {
                return Err(GraphError::GraphStepLimitExceeded {
                    limit: self.ctx.config.graph_step_limit,
                });
            }
            state.graph_steps_taken += 1;

            current = self.step(current, &mut state).await?;

            if current == GraphNode::End {
                return Ok(state);
            }
        }
    }

    /// Executes `node` and returns the next node per the fixed edge
    /// table (spec §2) or the two conditional routing predicates.
    async fn step(&self, node: GraphNode, state: &mut FinanceState) -> Result<GraphNode> {
        match node {
            GraphNode::Start => Ok(GraphNode::QueryRouter),
            GraphNode::QueryRouter => {
                query_router::run(&self.ctx, state).await?;
                Ok(route_after_classification(state))
            }
            GraphNode::DirectResponse => {
                direct_response::run(&self.ctx, state).await?;
                Ok(GraphNode::OutputFormatter)
            }
            GraphNode::Decomposer => {
                decomposer::run(&self.ctx, state).await?;
                Ok(GraphNode::StepExecutor)
            }
            GraphNode::StepExecutor => {
                step_executor::run(&self.ctx, state).await?;
                Ok(GraphNode::Verifier)
            }
            GraphNode::Verifier => {
                verifier::run(&self.ctx, state).await?;
                Ok(route_after_verification(state))
            }
            GraphNode::AdvanceIndex => {
                advance_index::run(&self.ctx, state).await?;
                Ok(GraphNode::StepExecutor)
            }
            GraphNode::OutputFormatter => {
                output_formatter::run(&self.ctx, state).await?;
                Ok(GraphNode::End)
            }
            GraphNode::End => Ok(GraphNode::End),
        }
    }
}

/// Re-exported so callers don't need to know `query_type` lives on
/// `FinanceState` to check the `non_financial` fast path (convenience
/// used by `finance-agent`'s CLI output).
pub fn is_non_financial(state: &FinanceState) -> bool {
    matches!(state.query_type, Some(QueryType::NonFinancial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticker::KeywordTickerExtractor;
    use async_trait::async_trait;

    struct ScriptedModel {
        responses: std::sync::Mutex<std::collections::VecDeque<&'static str>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<&'static str>) -> Self {
            ScriptedModel {
                responses: std::sync::Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _request: crate::llm::ChatRequest) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.pop_front().unwrap_or("ok").to_string())
        }
    }

    #[tokio::test]
    async fn non_financial_query_skips_the_decomposition_path() {
        let model = Arc::new(ScriptedModel::new(vec![
            "nonfinancial",
            "a P/E ratio compares price to earnings",
            r#"{"summary": "s", "content_blocks": [{"type": "text", "text": "t"}], "key_insights": [], "recommendations": [], "metadata": {}}"#,
            "<Component/>",
        ]));
        let engine = Engine::new(
            model,
            Arc::new(ToolRegistry::new()),
            Arc::new(KeywordTickerExtractor::default()),
            EngineConfig::default(),
        );
        let cancel = CancellationToken::new();
        let state = engine.run("What is a P/E ratio?", &cancel).await.unwrap();
        assert!(is_non_financial(&state));
        assert!(state.steps.is_empty());
        assert!(state.structured_output.is_some());
    }

    #[tokio::test]
    async fn graph_step_limit_aborts_the_query() {
        // Every verifier call says needs_more_data forever; the engine
        // must still terminate at graph_step_limit (spec §8 invariant 1).
        struct AlwaysRetryModel;
        #[async_trait]
        impl ChatModel for AlwaysRetryModel {
            async fn complete(&self, request: crate::llm::ChatRequest) -> Result<String> {
                if request.system_prompt.contains("planner") {
                    Ok(r#"[{"step_id": "final_synthesis", "step_type": "analysis", "description": "s", "analysis_prompt": "p", "depends_on": []}]"#.to_string())
                } else if request.system_prompt.contains("strict quality-control") {
                    Ok(r#"{"verdict": "needs_more_data", "reason": "still incomplete"}"#.to_string())
                } else {
                    Ok("financial".to_string())
                }
            }
        }
        let engine = Engine::new(
            Arc::new(AlwaysRetryModel),
            Arc::new(ToolRegistry::new()),
            Arc::new(KeywordTickerExtractor::default()),
            EngineConfig::default().with_graph_step_limit(10).with_retry_budget(1000),
        );
        let cancel = CancellationToken::new();
        let err = engine.run("Compare AAPL and MSFT", &cancel).await.unwrap_err();
        assert!(matches!(err, GraphError::GraphStepLimitExceeded { limit: 10 }));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_without_formatter() {
        let model = Arc::new(ScriptedModel::new(vec!["nonfinancial"]));
        let engine = Engine::new(
            model,
            Arc::new(ToolRegistry::new()),
            Arc::new(KeywordTickerExtractor::default()),
            EngineConfig::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine.run("anything", &cancel).await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }
}
