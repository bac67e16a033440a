use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::client::{LlmClient, RunOutcome};
use crate::error::{LlmError, Result};
use crate::query_plan::{PermissionMode, QueryPlan};

/// `LlmClient` backed by the Claude Code CLI (`claude -p --output-format
/// json`). Grounded on the reference system's `ClaudeCliProvider`: a
/// system prompt written to a temp file, MCP servers injected via
/// `--mcp-config`, and the response parsed out of the CLI's JSON
/// envelope. Session resumption uses `--resume <session_id>`; the CLI's
/// own `session_id` in its JSON output round-trips back out.
pub struct ClaudeCliClient {
    command: String,
}

impl ClaudeCliClient {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl LlmClient for ClaudeCliClient {
    fn name(&self) -> &str {
        "claude-cli"
    }

    async fn run(&self, plan: QueryPlan) -> Result<RunOutcome> {
        let sys_file = tempfile::Builder::new()
            .prefix("conductor-sys-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| LlmError::Transport(format!("failed to create temp file: {e}")))?;
        std::fs::write(sys_file.path(), plan.system_prompt.as_deref().unwrap_or(""))
            .map_err(|e| LlmError::Transport(format!("failed to write system prompt: {e}")))?;

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg("-p")
            .arg("--output-format")
            .arg("json")
            .arg("--system-prompt-file")
            .arg(sys_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(session_id) = &plan.session_id {
            cmd.arg("--resume").arg(session_id);
        }

        match plan.policy.permission_mode {
            PermissionMode::Default => {}
            PermissionMode::AcceptEdits => {
                cmd.arg("--permission-mode").arg("acceptEdits");
            }
            PermissionMode::BypassPermissions => {
                cmd.arg("--dangerously-skip-permissions");
            }
        }

        for tool in &plan.allowed_tools {
            cmd.arg("--allowedTools").arg(tool);
        }

        let _mcp_file = write_mcp_config(&plan, &mut cmd)?;

        debug!(
            command = %self.command,
            prompt_len = plan.prompt.len(),
            tools = plan.allowed_tools.len(),
            "invoking claude CLI"
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LlmError::Transport(format!(
                    "claude CLI not found at '{}' — install Claude Code first",
                    self.command
                ))
            } else {
                LlmError::Transport(format!("failed to spawn claude CLI: {e}"))
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(plan.prompt.as_bytes())
                .await
                .map_err(|e| LlmError::Transport(format!("failed to write to claude stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LlmError::Transport(format!("claude CLI process error: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = output.status.code().unwrap_or(1) as u16;
            return Err(LlmError::Api {
                status,
                message: format!("claude CLI exited with code {status}: {stderr}"),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| LlmError::Transport(format!("failed to parse claude CLI JSON: {e}")))?;

        if json.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false) {
            let message = json
                .get("result")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error from claude CLI")
                .to_string();
            return Err(LlmError::Api { status: 500, message });
        }

        let response = json
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let session_id = json
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| plan.session_id.clone().unwrap_or_default());

        Ok(RunOutcome { response, session_id })
    }
}

/// Writes `plan.mcp_servers` to a temp JSON file and attaches `--mcp-config`.
/// Returns the temp file handle — it must outlive the spawned child.
fn write_mcp_config(
    plan: &QueryPlan,
    cmd: &mut tokio::process::Command,
) -> Result<Option<tempfile::NamedTempFile>> {
    if plan.mcp_servers.is_empty() {
        return Ok(None);
    }

    let servers: serde_json::Map<String, serde_json::Value> = plan
        .mcp_servers
        .iter()
        .map(|(name, server)| {
            (
                name.clone(),
                serde_json::json!({
                    "type": "stdio",
                    "command": server.command,
                    "args": server.args,
                    "env": server.env,
                }),
            )
        })
        .collect();
    let config = serde_json::json!({ "mcpServers": servers });

    let file = tempfile::Builder::new()
        .prefix("conductor-mcp-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| LlmError::Transport(format!("failed to create mcp config temp file: {e}")))?;
    std::fs::write(file.path(), serde_json::to_string(&config).unwrap_or_default())
        .map_err(|e| LlmError::Transport(format!("failed to write mcp config: {e}")))?;
    cmd.arg("--mcp-config").arg(file.path());

    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_name_identifies_provider() {
        let client = ClaudeCliClient::new("claude");
        assert_eq!(client.name(), "claude-cli");
    }
}
