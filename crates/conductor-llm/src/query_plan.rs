use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A single MCP server descriptor, as assembled by `conductor-assembler`
/// and consumed by the LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// How permissively the LLM client may act on tool calls without asking
/// for confirmation. The reference system's invocation policy names this
/// axis; conductor carries the same three-level shape rather than
/// inventing its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
}

impl Default for PermissionMode {
    fn default() -> Self {
        PermissionMode::Default
    }
}

#[derive(Debug, Clone)]
pub struct InvocationPolicy {
    pub timeout: Duration,
    pub permission_mode: PermissionMode,
    pub max_turns: u32,
}

impl InvocationPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            permission_mode: PermissionMode::default(),
            max_turns: 25,
        }
    }
}

/// Everything one LLM invocation needs: prompts, session resumption,
/// the assembled tool/MCP/sub-agent surface, and an invocation policy.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub session_id: Option<String>,
    pub allowed_tools: IndexSet<String>,
    pub sub_agents: HashMap<String, SubAgentConfig>,
    pub mcp_servers: HashMap<String, McpServerConfig>,
    pub policy: InvocationPolicy,
}

impl QueryPlan {
    pub fn new(prompt: impl Into<String>, policy: InvocationPolicy) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            session_id: None,
            allowed_tools: IndexSet::new(),
            sub_agents: HashMap::new(),
            mcp_servers: HashMap::new(),
            policy,
        }
    }
}

/// A named sub-agent exposed to the LLM, e.g. via Claude's agent tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentConfig {
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}
