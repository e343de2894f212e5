//! Remote chat-completion providers. Only the Claude binding is shipped;
//! the engine's `ChatModel` trait (spec §6) is narrow enough that adding
//! another provider is a single new module implementing it.

pub mod claude;

pub use claude::ClaudeClient;
