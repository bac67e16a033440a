use conductor_core::{Conversation, Message, Task};

/// The worker response grammar, for the conversation worker's system
/// prompt.
const WORKER_ACTION_GRAMMAR: &str = r#"Reply with a single JSON object using exactly one of these shapes:

- {"needs_input": true, "question": {"type": "confirmation"|"choice"|"input", "prompt": "...", "options"?: [...]}, "message"?: "..."}
  Use this when you cannot continue without the user answering something.
- {"complete": true, "message": "..."}
  Use this when the background task this conversation represents is finished.
- {"state_update"?: {...}, "next_step"?: "...", "message"?: "..."}
  Use this to continue the background cycle, optionally updating state and advancing to a named step.

Any response that is not one of these is treated as the third shape with no updates."#;

/// Builds the conversation worker's system prompt.
pub fn build_worker_system_prompt(conversation: &Conversation) -> String {
    format!(
        "You are resuming a background conversation titled {:?}. This is an autonomous cycle: there is no user watching right now.\n\n{WORKER_ACTION_GRAMMAR}",
        conversation.title
    )
}

/// Builds the conversation worker's user prompt: context, step, message
/// history, state_data.
pub fn build_worker_user_prompt(conversation: &Conversation, history: &[Message]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Step: {}\nContext: {}\nState data: {}\n\n",
        conversation.state.step,
        serde_json::Value::Object(conversation.state.context.clone()),
        serde_json::Value::Object(conversation.state.data.clone()),
    ));
    out.push_str("CONVERSATION HISTORY:\n");
    for message in history {
        out.push_str(&format!("{}: {}\n", role_label(message.role), message.content));
    }
    out
}

/// Builds the task worker's system prompt: names the task and asks for a
/// JSON-free reply.
pub fn build_task_system_prompt(task: &Task) -> String {
    format!(
        "You are running the recurring task {:?}{}. Respond in plain text only — do not wrap your reply in JSON.",
        task.name,
        if task.description.is_empty() {
            String::new()
        } else {
            format!(" ({})", task.description)
        }
    )
}

/// Builds the task worker's user prompt: run number, last-run timestamp,
/// `task_context`, and the last 10 messages.
pub fn build_task_user_prompt(task: &Task, history: &[Message]) -> String {
    let mut out = String::new();
    let run_number = task.current_runs + 1;
    match task.max_runs {
        Some(max) => out.push_str(&format!("Run {run_number}/{max}.\n")),
        None => out.push_str(&format!("Run {run_number}.\n")),
    }
    match task.last_run_at {
        Some(last) => out.push_str(&format!("Last run at: {last}\n")),
        None => out.push_str("This is the first run.\n"),
    }
    out.push_str(&format!(
        "Task context: {}\n\n",
        serde_json::Value::Object(task.task_context.clone())
    ));
    out.push_str("RECENT MESSAGES:\n");
    for message in history.iter().rev().take(10).collect::<Vec<_>>().into_iter().rev() {
        out.push_str(&format!("{}: {}\n", role_label(message.role), message.content));
    }
    out
}

fn role_label(role: conductor_core::MessageRole) -> &'static str {
    match role {
        conductor_core::MessageRole::User => "user",
        conductor_core::MessageRole::Assistant => "assistant",
        conductor_core::MessageRole::System => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::ids::{ConversationId, UserId};

    #[test]
    fn worker_system_prompt_names_conversation() {
        let convo = Conversation::new(ConversationId::new(), UserId::new(), "nightly digest");
        let prompt = build_worker_system_prompt(&convo);
        assert!(prompt.contains("nightly digest"));
        assert!(prompt.contains("needs_input"));
        assert!(prompt.contains("complete"));
    }

    #[test]
    fn task_user_prompt_caps_history_at_ten() {
        let now = chrono::Utc::now();
        let task = conductor_core::Task {
            id: conductor_core::ids::TaskId::new(),
            conversation_id: conductor_core::ids::ConversationId::new(),
            user_id: conductor_core::ids::UserId::new(),
            name: "greet".into(),
            description: String::new(),
            status: conductor_core::task::TaskStatus::Active,
            schedule: conductor_core::task::TaskSchedule::Interval {
                value: 15,
                unit: conductor_core::task::IntervalUnit::Seconds,
            },
            next_run_at: None,
            last_run_at: None,
            max_runs: Some(3),
            current_runs: 1,
            expires_at: None,
            task_context: serde_json::Map::new(),
            consecutive_failures: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        let history: Vec<Message> = (0..15)
            .map(|i| {
                Message::new(
                    task.conversation_id.clone(),
                    conductor_core::MessageRole::User,
                    format!("message {i}"),
                    conductor_core::MessageSource::Worker,
                )
            })
            .collect();
        let prompt = build_task_user_prompt(&task, &history);
        assert!(prompt.contains("Run 2/3"));
        assert!(prompt.contains("message 14"));
        assert!(!prompt.contains("message 4"));
    }
}
