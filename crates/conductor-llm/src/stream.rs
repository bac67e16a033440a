use serde_json::Value;

/// Events produced by `LlmClient::stream`. `Done` is terminal; consumers
/// stop reading after it.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Init { session_id: String },
    Assistant { content: String },
    ToolUse { name: String, input: Value },
    ToolResult { content: String },
    Error { message: String },
    Done,
}
