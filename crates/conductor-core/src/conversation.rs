use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ConversationId, UserId};

/// Lifecycle state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Background,
    WaitingInput,
    Archived,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Background => "background",
            ConversationStatus::WaitingInput => "waiting_input",
            ConversationStatus::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

/// How a `background` conversation is re-invoked by the conversation worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    Cron { cron_expression: String },
    Scheduled { run_at: DateTime<Utc> },
    Immediate,
}

/// Type of a pending question blocking a conversation on user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingQuestionType {
    Confirmation,
    Choice,
    Input,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuestion {
    #[serde(rename = "type")]
    pub kind: PendingQuestionType,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// The conversation's embedded three-part state machine payload.
///
/// `context` and `data` are free-form JSON objects; `step` is an opaque
/// label the LLM reads back on the next worker cycle. Updates only ever
/// shallow-merge into `data`/`context` — nested objects are replaced
/// wholesale, never deep-merged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationState {
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default = "default_step")]
    pub step: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_step() -> String {
    "initial".to_string()
}

/// Shallow-merge `patch` into `target`: top-level keys are overwritten,
/// nested objects are replaced wholesale, never recursively merged.
pub fn shallow_merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (k, v) in patch {
        target.insert(k.clone(), v.clone());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub status: ConversationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    pub state: ConversationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<PendingQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_session_id: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, user_id: UserId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title: title.into(),
            status: ConversationStatus::Active,
            schedule: None,
            next_run_at: None,
            state: ConversationState::default(),
            pending_question: None,
            claude_session_id: None,
            skills: Vec::new(),
            consecutive_failures: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clearing a pending question re-derives status from the schedule.
    pub fn clear_pending_question(&mut self) {
        self.pending_question = None;
        self.status = if self.schedule.is_some() {
            ConversationStatus::Background
        } else {
            ConversationStatus::Active
        };
    }
}
