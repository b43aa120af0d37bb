//! LLM runner: tier-keyed model resolution, vendor/proxy dispatch, usage
//! normalization, and the bounded read-only tool-calling loop used by
//! `Sdk`-mode validators.

mod clients;
mod message;
mod runner;
mod tier;
mod tools;
mod usage;

pub use message::{ChatMessage, ChatRole, ToolCall, ToolCallFunction};
pub use runner::{AgentConfig, ExecutionMode, LlmRunner, RunResult};
pub use tier::{AuthMode, ModelCatalog, ModelTier, resolve_auth};
pub use tools::ExtraTool;
pub use usage::Usage;
