//! finance-agent CLI - thin front-end over the finance-graph engine.
//!
//! Wiring only: argument parsing, collaborator construction, and mapping
//! the engine's outcome onto an exit code (spec §6).

mod demo_tools;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use finance_graph::{Engine, EngineConfig, FinanceState, GraphError, LlmTickerExtractor, ToolRegistry};
use finance_llm::{ClaudeClient, RemoteLlmConfig};
use finance_tooling::config::{get_env_bool, get_env_or, get_env_parse_or};
use finance_tooling::logging::init_tracing;

const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

#[derive(Parser)]
#[command(name = "finance-agent")]
#[command(about = "A directed-graph financial-analysis agent", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// The query to run. Omit for an interactive REPL.
    query: Option<String>,

    /// Single-shot mode with an explicit query (equivalent to the positional form).
    #[arg(long = "query")]
    query_flag: Option<String>,

    /// Emit all node trace lines to standard error.
    #[arg(long)]
    debug: bool,
}

/// Process exit codes (spec §6).
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const CONFIGURATION_ERROR: i32 = 1;
    pub const RUNTIME_ERROR: i32 = 2;
    pub const CANCELLED: i32 = 130;
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let debug = args.debug || get_env_bool("FINANCE_AGENT_DEBUG").ok().flatten().unwrap_or(false);
    init_tracing(debug);

    let engine = match build_engine() {
        Ok(engine) => engine,
        Err(message) => {
            eprintln!("configuration error: {}", message);
            std::process::exit(exit_code::CONFIGURATION_ERROR);
        }
    };

    let cancel = CancellationToken::new();
    install_ctrl_c_handler(cancel.clone());

    let query = args.query.or(args.query_flag);
    let code = match query {
        Some(query) => run_single_shot(&engine, query, &cancel).await,
        None => run_repl(&engine, &cancel).await,
    };
    std::process::exit(code);
}

fn build_engine() -> Result<Engine, String> {
    let base_url = get_env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com")
        .map_err(|e| e.to_string())?;
    let model: String = get_env_parse_or("FINANCE_AGENT_LLM_MODEL", "claude-3-5-sonnet-latest".to_string())
        .map_err(|e| e.to_string())?;

    let llm_config = RemoteLlmConfig::from_env(ANTHROPIC_API_KEY_VAR, base_url, model.clone())
        .map_err(|e| e.to_string())?;
    let llm = Arc::new(ClaudeClient::new(llm_config));

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(demo_tools::CurrentPriceTool::default()));
    tools.register(Arc::new(demo_tools::HistoricalPricesTool::default()));
    tools.register(Arc::new(demo_tools::CompanyNewsTool::default()));

    let config = EngineConfig::new()
        .with_retry_budget(get_env_parse_or("FINANCE_AGENT_RETRY_BUDGET", 2u32).map_err(|e| e.to_string())?)
        .with_replan_budget(get_env_parse_or("FINANCE_AGENT_REPLAN_BUDGET", 1u32).map_err(|e| e.to_string())?)
        .with_graph_step_limit(get_env_parse_or("FINANCE_AGENT_GRAPH_STEP_LIMIT", 50usize).map_err(|e| e.to_string())?)
        .with_tool_result_size_cap_bytes(
            get_env_parse_or("FINANCE_AGENT_TOOL_RESULT_SIZE_CAP_BYTES", 262_144usize).map_err(|e| e.to_string())?,
        )
        .with_call_timeout(Duration::from_secs(
            get_env_parse_or("FINANCE_AGENT_CALL_TIMEOUT_SECS", 60u64).map_err(|e| e.to_string())?,
        ))
        .with_llm_model(model);

    let ticker_extractor = Arc::new(LlmTickerExtractor::new(llm.clone()));
    Ok(Engine::new(llm, Arc::new(tools), ticker_extractor, config))
}

fn install_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

async fn run_single_shot(engine: &Engine, query: String, cancel: &CancellationToken) -> i32 {
    match engine.run(query, cancel).await {
        Ok(state) => {
            print_result(&state);
            exit_code::SUCCESS
        }
        Err(err) => handle_error(err),
    }
}

async fn run_repl(engine: &Engine, cancel: &CancellationToken) -> i32 {
    println!("finance-agent interactive mode. Type a query, or 'exit' to quit.");
    let stdin = io::stdin();
    loop {
        if cancel.is_cancelled() {
            return exit_code::CANCELLED;
        }
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            return exit_code::SUCCESS;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            return exit_code::SUCCESS;
        }

        match engine.run(query, cancel).await {
            Ok(state) => print_result(&state),
            Err(err) => {
                let code = handle_error(err);
                if code == exit_code::CANCELLED {
                    return code;
                }
            }
        }
    }
}

fn print_result(state: &FinanceState) {
    match &state.structured_output {
        Some(output) => {
            if let Ok(pretty) = serde_json::to_string_pretty(output) {
                println!("{}", pretty);
            } else {
                println!("{}", output);
            }
        }
        None => println!("(no structured output produced)"),
    }
}

fn handle_error(err: GraphError) -> i32 {
    match err {
        GraphError::Cancelled => {
            eprintln!("query cancelled");
            exit_code::CANCELLED
        }
        GraphError::GraphStepLimitExceeded { limit } => {
            eprintln!("runtime error: graph step limit of {} exceeded", limit);
            exit_code::RUNTIME_ERROR
        }
        other => {
            eprintln!("runtime error: {}", other);
            exit_code::RUNTIME_ERROR
        }
    }
}
