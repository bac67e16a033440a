use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::extract::{extract_json_object, strip_span};

/// `create_schedule.type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Cron,
    Scheduled,
    Immediate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSchedule {
    #[serde(rename = "type")]
    pub kind: ScheduleKind,
    pub cron_expression: Option<String>,
    pub run_at: Option<String>,
    pub initial_state: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeedsInputChat {
    #[serde(rename = "type")]
    pub kind: String,
    pub prompt: String,
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteTaskRef {
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
    #[serde(rename = "taskName")]
    pub task_name: Option<String>,
}

/// The mutually-exclusive half of a chat-context response: at most one of
/// these fires per turn, checked in the order the protocol specifies
/// (`create_schedule` → `needs_input` → `state_update`).
#[derive(Debug, Clone)]
pub enum ChatPrimary {
    CreateSchedule(CreateSchedule),
    NeedsInput(NeedsInputChat),
    StateUpdate(Value),
    Plain,
}

/// Full classification of one chat-turn response. `create_task` and
/// `delete_task` are independent of `primary` — the protocol applies them
/// unconditionally whenever present, regardless of which primary fired.
#[derive(Debug, Clone)]
pub struct ChatClassification {
    pub primary: ChatPrimary,
    pub create_task: Option<Value>,
    pub delete_task: Option<DeleteTaskRef>,
    pub message: String,
}

/// Classifies a raw LLM response in chat context.
///
/// If no JSON object is found, or the object carries none of the known
/// fields, this is plain text and `primary` is `Plain`.
pub fn classify_chat(response: &str) -> ChatClassification {
    let Some((value, span)) = extract_json_object(response) else {
        return ChatClassification {
            primary: ChatPrimary::Plain,
            create_task: None,
            delete_task: None,
            message: response.trim().to_string(),
        };
    };

    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            return ChatClassification {
                primary: ChatPrimary::Plain,
                create_task: None,
                delete_task: None,
                message: response.trim().to_string(),
            }
        }
    };

    let primary = if let Some(v) = obj.get("create_schedule") {
        serde_json::from_value::<CreateSchedule>(v.clone())
            .map(ChatPrimary::CreateSchedule)
            .unwrap_or_else(|e| {
                warn!(error = %e, "malformed create_schedule in LLM response, falling back to plain");
                ChatPrimary::Plain
            })
    } else if let Some(v) = obj.get("needs_input").filter(|v| v.is_object()) {
        serde_json::from_value::<NeedsInputChat>(v.clone())
            .map(ChatPrimary::NeedsInput)
            .unwrap_or_else(|e| {
                warn!(error = %e, "malformed needs_input in LLM response, falling back to plain");
                ChatPrimary::Plain
            })
    } else if let Some(v) = obj.get("state_update").filter(|v| v.is_object()) {
        ChatPrimary::StateUpdate(v.clone())
    } else {
        ChatPrimary::Plain
    };

    let create_task = obj.get("create_task").cloned();
    let delete_task = obj
        .get("delete_task")
        .and_then(|v| serde_json::from_value::<DeleteTaskRef>(v.clone()).ok());

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let stripped = strip_span(response, &span);
            if stripped.is_empty() {
                response.trim().to_string()
            } else {
                stripped
            }
        });

    ChatClassification {
        primary,
        create_task,
        delete_task,
        message,
    }
}
