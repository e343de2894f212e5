//! Ambient utilities shared across the finance-agent workspace.
//!
//! Everything here is domain-agnostic — `finance-graph` and `finance-llm`
//! reach for it the way the rest of the workspace reaches for the
//! standard library:
//!
//! - `config` - environment-variable configuration loading
//! - `error` - error-context helpers and error-chain formatting
//! - `logging` - `tracing` setup and timing helpers
//! - `async_utils` - retry policies and timeout wrappers for async operations

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the tooling crate itself (as opposed to the
/// errors it helps other crates format or retry around).
#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("tooling error: {0}")]
    General(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tooling operations.
pub type Result<T> = std::result::Result<T, ToolingError>;

/// Configuration for the tooling crate's own behavior (distinct from
/// `finance_graph::EngineConfig`, which governs the graph).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolingConfig {
    pub verbose: bool,
    pub output_dir: Option<String>,
}

impl ToolingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}
