//! End-to-end scenarios seeding the test suite (spec §8).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use finance_graph::tool::{ParamSpec, ParamType, Tool, ToolCategory, ToolError, ToolRegistry};
use finance_graph::{ChatModel, ChatRequest, Engine, EngineConfig, GraphError, KeywordTickerExtractor};

struct RoutedModel;

#[async_trait]
impl ChatModel for RoutedModel {
    async fn complete(&self, request: ChatRequest) -> finance_graph::Result<String> {
        let sys = request.system_prompt.as_str();
        if sys.contains("classify") {
            Ok(if request.user_prompt.to_lowercase().contains("p/e ratio") {
                "nonfinancial".to_string()
            } else {
                "financial".to_string()
            })
        } else if sys.contains("helpful general-purpose") {
            Ok("A P/E ratio divides share price by earnings per share.".to_string())
        } else if sys.contains("planner") {
            Ok(plan_for(&request.user_prompt))
        } else if sys.contains("quality-control") {
            if request.user_prompt.contains("Success: false") {
                Ok(r#"{"verdict": "needs_more_data", "reason": "step failed, retry"}"#.to_string())
            } else {
                Ok(r#"{"verdict": "ok", "reason": "looks good"}"#.to_string())
            }
        } else if sys.contains("financial analyst") {
            Ok("Apple's current price is $150, a solid buy.".to_string())
        } else if sys.contains("structured financial analysis result as") {
            Ok(structured_for(&request.user_prompt))
        } else if sys.contains("UI component") {
            Ok("<FinanceCard/>".to_string())
        } else {
            Ok("ok".to_string())
        }
    }
}

fn plan_for(user_prompt: &str) -> String {
    if user_prompt.contains("AMZN") || user_prompt.contains("MSFT") {
        r#"[
            {"step_id": "amzn_price", "step_type": "data", "description": "AMZN revenue",
             "tool_name": "get_current_price", "parameters": {"ticker": "AMZN"}, "depends_on": []},
            {"step_id": "msft_price", "step_type": "data", "description": "MSFT revenue",
             "tool_name": "get_current_price", "parameters": {"ticker": "MSFT"}, "depends_on": []},
            {"step_id": "final_synthesis", "step_type": "analysis", "description": "compare",
             "analysis_prompt": "Compare AMZN and MSFT revenue", "depends_on": ["amzn_price", "msft_price"]}
        ]"#
        .to_string()
    } else {
        r#"[
            {"step_id": "price", "step_type": "data", "description": "current price",
             "tool_name": "get_current_price", "parameters": {"ticker": "AAPL"}, "depends_on": []},
            {"step_id": "final_synthesis", "step_type": "analysis", "description": "synthesize",
             "analysis_prompt": "Summarize Apple's current price", "depends_on": ["price"]}
        ]"#
        .to_string()
    }
}

fn structured_for(user_prompt: &str) -> String {
    if user_prompt.contains("$150") || user_prompt.contains("solid buy") {
        r#"{"summary": "AAPL is trading at $150", "content_blocks": [{"type": "metric", "label": "Price", "value": "$150"}], "key_insights": [], "recommendations": [], "metadata": {}}"#.to_string()
    } else if user_prompt.to_lowercase().contains("compare") {
        r#"{"summary": "AMZN vs MSFT", "content_blocks": [{"type": "comparison", "title": "Revenue", "items": []}], "key_insights": [], "recommendations": [], "metadata": {}}"#.to_string()
    } else {
        r#"{"summary": "answer", "content_blocks": [{"type": "text", "text": "answer"}], "key_insights": [], "recommendations": [], "metadata": {}}"#.to_string()
    }
}

struct PriceTool {
    fail_n_times: AtomicUsize,
}

impl PriceTool {
    fn reliable() -> Self {
        PriceTool { fail_n_times: AtomicUsize::new(0) }
    }

    fn fail_once_then_succeed() -> Self {
        PriceTool { fail_n_times: AtomicUsize::new(1) }
    }
}

#[async_trait]
impl Tool for PriceTool {
    fn name(&self) -> &str {
        "get_current_price"
    }
    fn description(&self) -> &str {
        "current stock price"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::MarketQuotes
    }
    fn parameter_schema(&self) -> &[ParamSpec] {
        static SCHEMA: std::sync::OnceLock<Vec<ParamSpec>> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| vec![ParamSpec::required("ticker", ParamType::String, "ticker symbol")])
    }
    async fn invoke(&self, parameters: HashMap<String, Value>) -> std::result::Result<Value, ToolError> {
        let remaining = self.fail_n_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_n_times.fetch_sub(1, Ordering::SeqCst);
            return Err(ToolError::ExecutionFailed {
                tool: "get_current_price".into(),
                message: "transient upstream error".into(),
            });
        }
        Ok(Value::Object(
            [("ticker".to_string(), parameters.get("ticker").cloned().unwrap_or(Value::Null)),
             ("price".to_string(), Value::from(150))]
                .into_iter()
                .collect(),
        ))
    }
}

struct AlwaysFailTool;

#[async_trait]
impl Tool for AlwaysFailTool {
    fn name(&self) -> &str {
        "get_current_price"
    }
    fn description(&self) -> &str {
        "current stock price"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::MarketQuotes
    }
    fn parameter_schema(&self) -> &[ParamSpec] {
        static SCHEMA: std::sync::OnceLock<Vec<ParamSpec>> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| vec![ParamSpec::required("ticker", ParamType::String, "ticker symbol")])
    }
    async fn invoke(&self, _parameters: HashMap<String, Value>) -> std::result::Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool: "get_current_price".into(),
            message: "vendor unavailable".into(),
        })
    }
}

fn registry_with(tool: Arc<dyn Tool>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(tool);
    Arc::new(registry)
}

#[tokio::test]
async fn non_financial_query_produces_a_single_text_block() {
    let engine = Engine::new(
        Arc::new(RoutedModel),
        Arc::new(ToolRegistry::new()),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("What is a P/E ratio?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.query_type, Some(finance_graph::QueryType::NonFinancial));
    assert!(state.steps.is_empty());
    assert!(state.direct_response.is_some());
    let structured: finance_graph::StructuredOutput =
        serde_json::from_value(state.structured_output.unwrap()).unwrap();
    assert_eq!(structured.content_blocks.len(), 1);
}

#[tokio::test]
async fn single_ticker_current_price_produces_a_metric_block() {
    let engine = Engine::new(
        Arc::new(RoutedModel),
        registry_with(Arc::new(PriceTool::reliable())),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("What is Apple's current stock price?", &CancellationToken::new())
        .await
        .unwrap();

    assert!(state.steps.iter().any(|s| s.tool_name.as_deref() == Some("get_current_price")));
    assert!(state.steps.last().unwrap().is_final_synthesis());
    let structured: finance_graph::StructuredOutput =
        serde_json::from_value(state.structured_output.unwrap()).unwrap();
    assert!(structured
        .content_blocks
        .iter()
        .any(|b| matches!(b, finance_graph::ContentBlock::Metric { .. })));
}

#[tokio::test]
async fn tool_transient_failure_then_recovery_retries_exactly_once() {
    let engine = Engine::new(
        Arc::new(RoutedModel),
        registry_with(Arc::new(PriceTool::fail_once_then_succeed())),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("What is Apple's current stock price?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.retry_count.get("price"), Some(&1));
    assert_eq!(state.step_results.get("price").unwrap().success, true);
}

#[tokio::test]
async fn wrong_ticker_replan_ends_with_comparison_block() {
    struct ReplanOnceModel {
        replanned: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for ReplanOnceModel {
        async fn complete(&self, request: ChatRequest) -> finance_graph::Result<String> {
            let sys = request.system_prompt.as_str();
            if sys.contains("classify") {
                Ok("financial".to_string())
            } else if sys.contains("planner") {
                if self.replanned.load(Ordering::SeqCst) == 0 {
                    Ok(r#"[
                        {"step_id": "price", "step_type": "data", "description": "wrong ticker",
                         "tool_name": "get_current_price", "parameters": {"ticker": "AAPL"}, "depends_on": []},
                        {"step_id": "final_synthesis", "step_type": "analysis", "description": "s",
                         "analysis_prompt": "p", "depends_on": ["price"]}
                    ]"#.to_string())
                } else {
                    Ok(plan_for(&request.user_prompt))
                }
            } else if sys.contains("quality-control") {
                if self.replanned.load(Ordering::SeqCst) == 0 && request.user_prompt.contains("price") {
                    self.replanned.store(1, Ordering::SeqCst);
                    Ok(r#"{"verdict": "replan", "reason": "wrong ticker, should be AMZN and MSFT"}"#.to_string())
                } else {
                    Ok(r#"{"verdict": "ok", "reason": "fine"}"#.to_string())
                }
            } else if sys.contains("financial analyst") {
                Ok("AMZN and MSFT revenue compared.".to_string())
            } else if sys.contains("structured financial analysis result as") {
                Ok(structured_for(&request.user_prompt))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    let engine = Engine::new(
        Arc::new(ReplanOnceModel { replanned: AtomicUsize::new(0) }),
        registry_with(Arc::new(PriceTool::reliable())),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("Compare AMZN and MSFT revenue", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.replan_count, 1);
    assert!(state.steps.iter().any(|s| s.parameters.as_ref().map(|p| p.get("ticker") == Some(&Value::String("AMZN".into()))).unwrap_or(false)));
    assert!(state.steps.iter().any(|s| s.parameters.as_ref().map(|p| p.get("ticker") == Some(&Value::String("MSFT".into()))).unwrap_or(false)));
    let structured: finance_graph::StructuredOutput =
        serde_json::from_value(state.structured_output.unwrap()).unwrap();
    assert!(structured
        .content_blocks
        .iter()
        .any(|b| matches!(b, finance_graph::ContentBlock::Comparison { .. })));
}

#[tokio::test]
async fn persistent_needs_more_data_is_accepted_after_budget_exhaustion() {
    struct AlwaysNeedsMoreDataModel;

    #[async_trait]
    impl ChatModel for AlwaysNeedsMoreDataModel {
        async fn complete(&self, request: ChatRequest) -> finance_graph::Result<String> {
            let sys = request.system_prompt.as_str();
            if sys.contains("classify") {
                Ok("financial".to_string())
            } else if sys.contains("planner") {
                Ok(plan_for(&request.user_prompt))
            } else if sys.contains("quality-control") {
                Ok(r#"{"verdict": "needs_more_data", "reason": "still not enough"}"#.to_string())
            } else if sys.contains("financial analyst") {
                Ok("partial analysis".to_string())
            } else if sys.contains("structured financial analysis result as") {
                Ok(structured_for("answer"))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    let engine = Engine::new(
        Arc::new(AlwaysNeedsMoreDataModel),
        registry_with(Arc::new(PriceTool::reliable())),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("What is Apple's current stock price?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.retry_count.get("price"), Some(&2));
    assert_eq!(state.last_verification.unwrap().verdict, finance_graph::Verdict::Ok);
}

#[tokio::test]
async fn all_tools_failing_still_terminates_with_a_structured_artifact() {
    let engine = Engine::new(
        Arc::new(RoutedModel),
        registry_with(Arc::new(AlwaysFailTool)),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("What is Apple's current stock price?", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!state.step_results.get("price").unwrap().success);
    assert!(state.structured_output.is_some());
}

#[tokio::test]
async fn no_step_succeeding_forces_no_reliable_data_summary() {
    struct AllCallsFailModel;

    #[async_trait]
    impl ChatModel for AllCallsFailModel {
        async fn complete(&self, request: ChatRequest) -> finance_graph::Result<String> {
            let sys = request.system_prompt.as_str();
            if sys.contains("classify") {
                Ok("financial".to_string())
            } else if sys.contains("planner") {
                Ok(plan_for(&request.user_prompt))
            } else if sys.contains("quality-control") {
                Ok(r#"{"verdict": "ok", "reason": "accepted as-is"}"#.to_string())
            } else if sys.contains("financial analyst") {
                // The final_synthesis ANALYSIS step itself fails too, so
                // truly nothing in the plan succeeds.
                Err(GraphError::llm("StepExecutor", "model unavailable"))
            } else if sys.contains("structured financial analysis result as") {
                // Even though the LLM could still produce a well-formed,
                // upbeat structure here, the formatter must override it.
                Ok(r#"{"summary": "Everything looks great!", "content_blocks": [], "key_insights": [], "recommendations": [], "metadata": {}}"#.to_string())
            } else {
                Ok("ok".to_string())
            }
        }
    }

    let engine = Engine::new(
        Arc::new(AllCallsFailModel),
        registry_with(Arc::new(AlwaysFailTool)),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let state = engine
        .run("What is Apple's current stock price?", &CancellationToken::new())
        .await
        .unwrap();

    assert!(state.step_results.values().all(|r| !r.success));
    let structured: finance_graph::StructuredOutput =
        serde_json::from_value(state.structured_output.unwrap()).unwrap();
    assert_eq!(structured.summary, "No reliable data was obtainable.");
}

#[tokio::test]
async fn cancelling_before_run_short_circuits_to_end_with_no_formatter_output() {
    let engine = Engine::new(
        Arc::new(RoutedModel),
        Arc::new(ToolRegistry::new()),
        Arc::new(KeywordTickerExtractor::default()),
        EngineConfig::default(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine.run("anything", &cancel).await.unwrap_err();
    assert!(matches!(err, GraphError::Cancelled));
}
