//! Environment-variable configuration loading.
//!
//! `finance-agent` builds its `EngineConfig` and `RemoteLlmConfig` from
//! environment variables using these helpers, following the same
//! `get_env_parse_or`/`get_env_bool` pattern throughout.
//!
//! # Example
//!
//! ```rust,ignore
//! use finance_tooling::config::{get_env_parse_or, get_env_bool};
//!
//! let graph_step_limit: usize = get_env_parse_or("FINANCE_AGENT_GRAPH_STEP_LIMIT", 50)?;
//! let debug = get_env_bool("FINANCE_AGENT_DEBUG")?.unwrap_or(false);
//! ```

mod env;

pub use env::{
    build_env_key, get_env, get_env_bool, get_env_or, get_env_parse, get_env_parse_or,
};
