//! Chat-completion client implementations for the finance-agent engine.
//!
//! This crate provides concrete implementations of `finance_graph::llm::ChatModel`.
//! The engine's interface is a single `(system_prompt, user_prompt, temperature,
//! max_tokens) -> text` call (spec §6); nodes never pick a provider themselves,
//! so adding a vendor here is transparent to `finance-graph`.
//!
//! # Example
//!
//! ```rust,ignore
//! use finance_llm::config::RemoteLlmConfig;
//! use finance_llm::remote::ClaudeClient;
//! use finance_graph::llm::{ChatModel, ChatRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteLlmConfig::from_env(
//!         "ANTHROPIC_API_KEY",
//!         "https://api.anthropic.com",
//!         "claude-3-5-sonnet-latest",
//!     )?;
//!     let client = ClaudeClient::new(config);
//!
//!     let text = client
//!         .complete(ChatRequest::new("You are a financial analyst.", "Summarize AAPL's quarter."))
//!         .await?;
//!     println!("{text}");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod remote;

pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use remote::ClaudeClient;

pub use finance_graph::llm::{ChatModel, ChatRequest};
