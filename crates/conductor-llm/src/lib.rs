//! LLM invocation port: the `QueryPlan` request shape, the `LlmClient`
//! trait the chat processor and workers invoke against, a scripted test
//! double, and a CLI-backed provider.

mod claude_cli;
mod client;
mod error;
mod mock;
mod query_plan;
mod stream;

pub use claude_cli::ClaudeCliClient;
pub use client::{EventStream, LlmClient, RunOutcome};
pub use error::{LlmError, Result};
pub use mock::ScriptedLlmClient;
pub use query_plan::{InvocationPolicy, McpServerConfig, PermissionMode, QueryPlan, SubAgentConfig};
pub use stream::StreamEvent;
