//! The seven node implementations of spec §4, one module each. Every
//! node function takes the shared [`NodeContext`] plus `&mut
//! FinanceState` and returns `crate::error::Result<()>` — by convention
//! the `Result` is reserved for truly unrecoverable conditions (there
//! are none in a correctly wired engine); every node-internal failure
//! described in spec §4/§7 is handled inside the node and recorded in
//! `state`, never propagated.

pub mod advance_index;
pub mod decomposer;
pub mod direct_response;
pub mod output_formatter;
pub mod query_router;
pub mod step_executor;
pub mod verifier;

use std::sync::Arc;

use crate::budget::EngineConfig;
use crate::llm::ChatModel;
use crate::ticker::TickerExtractor;
use crate::tool::ToolRegistry;

/// The dependencies every node needs, injected once at engine
/// construction (spec §9 "Reflective model selection" fix: a single
/// `Arc<dyn ChatModel>`, never a global default).
#[derive(Clone)]
pub struct NodeContext {
    pub llm: Arc<dyn ChatModel>,
    pub tools: Arc<ToolRegistry>,
    pub ticker_extractor: Arc<dyn TickerExtractor>,
    pub config: EngineConfig,
}

impl NodeContext {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        ticker_extractor: Arc<dyn TickerExtractor>,
        config: EngineConfig,
    ) -> Self {
        NodeContext {
            llm,
            tools,
            ticker_extractor,
            config,
        }
    }
}
