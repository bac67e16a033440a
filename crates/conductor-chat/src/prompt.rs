use conductor_core::{Conversation, ConversationStatus, Integration, Task};

/// Providers the assembler knows how to wire up as MCP servers — used
/// here only to list which integrations a user *could* connect but
/// hasn't.
const KNOWN_PROVIDERS: [&str; 5] = [
    "gmail",
    "google_photos",
    "google_drive",
    "slack",
    "filesystem",
];

/// Builds the chat system prompt: connected integrations,
/// unconnected-but-available ones, the conversation state, active tasks,
/// current status, a status hint, and the action grammar.
pub fn build_chat_system_prompt(conversation: &Conversation, integrations: &[Integration], tasks: &[Task]) -> String {
    let mut sections = Vec::new();

    let connected: Vec<&Integration> = integrations.iter().filter(|i| i.active).collect();
    if connected.is_empty() {
        sections.push("No integrations are connected.".to_string());
    } else {
        let mut lines = vec!["Connected integrations:".to_string()];
        for integration in &connected {
            let detail = integration
                .metadata
                .get("userEmail")
                .or_else(|| integration.metadata.get("teamId"))
                .and_then(|v| v.as_str())
                .map(|v| format!(" ({v})"))
                .unwrap_or_default();
            lines.push(format!("- {}{}", integration.provider, detail));
        }
        sections.push(lines.join("\n"));
    }

    let connected_providers: std::collections::HashSet<&str> =
        connected.iter().map(|i| i.provider.as_str()).collect();
    let unconnected: Vec<&str> = KNOWN_PROVIDERS
        .iter()
        .filter(|p| !connected_providers.contains(*p))
        .copied()
        .collect();
    if !unconnected.is_empty() {
        sections.push(format!(
            "Available but not connected: {}",
            unconnected.join(", ")
        ));
    }

    sections.push(format!(
        "Conversation state:\n{}",
        serde_json::to_string_pretty(&conversation.state).unwrap_or_default()
    ));

    let active_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status == conductor_core::task::TaskStatus::Active)
        .collect();
    if active_tasks.is_empty() {
        sections.push("No active tasks.".to_string());
    } else {
        let mut lines = vec!["Active tasks:".to_string()];
        for task in active_tasks {
            lines.push(format!(
                "- {{id: {}, name: {:?}, schedule: {:?}, currentRuns: {}, maxRuns: {:?}, expiresAt: {:?}, lastRunAt: {:?}}}",
                task.id, task.name, task.schedule, task.current_runs, task.max_runs, task.expires_at, task.last_run_at
            ));
        }
        sections.push(lines.join("\n"));
    }

    sections.push(format!("Current status: {}", conversation.status));

    match conversation.status {
        ConversationStatus::WaitingInput => sections.push(
            "This conversation is waiting on a pending question; the user's message is likely answering it.".to_string(),
        ),
        ConversationStatus::Background => sections.push(
            "This conversation runs on a schedule in the background; the user is chatting with it directly right now.".to_string(),
        ),
        _ => {}
    }

    sections.push(ACTION_GRAMMAR.to_string());

    sections.join("\n\n")
}

/// The chat action grammar, written out for the model with a short
/// natural-language example per shape.
const ACTION_GRAMMAR: &str = r#"You may reply with plain text, or with a single JSON object using one of these shapes:

- {"create_schedule": {"type": "cron"|"scheduled"|"immediate", "cron_expression"?: "...", "run_at"?: "...", "initial_state"?: {...}}, "message": "..."}
  Example: user says "check my email every morning at 9" -> {"create_schedule": {"type": "cron", "cron_expression": "0 9 * * *"}, "message": "Will do, every day at 9am."}
- {"needs_input": {"type": "confirmation"|"choice"|"input", "prompt": "...", "options"?: [...]}, "message"?: "..."}
- {"state_update": {...}, "message": "..."}
- {"create_task": {"name": "...", "intervalValue"?: N, "intervalUnit"?: "seconds"|"minutes"|"hours"|"days", "cronExpression"?: "...", "maxRuns"?: N, "expiresInSeconds"?: N}, "message": "..."}
  Example: user says "remind me every 15 seconds, 3 times" -> {"create_task": {"name": "reminder", "intervalValue": 15, "intervalUnit": "seconds", "maxRuns": 3}, "message": "Set up."}
- {"delete_task": {"taskId"?: "...", "taskName"?: "..."}, "message": "..."}
"#;

/// Builds the user prompt: history then the new message, each history
/// line labelled by role (and `[background]` when it came from a worker
/// cycle rather than this chat).
pub fn build_chat_user_prompt(history: &[conductor_core::Message], new_message: &str) -> String {
    let mut out = String::from("CONVERSATION HISTORY:\n");
    for message in history {
        let tag = if message.source == conductor_core::MessageSource::Worker {
            format!("{} [background]", role_label(message.role))
        } else {
            role_label(message.role).to_string()
        };
        out.push_str(&format!("{}: {}\n", tag, message.content));
    }
    out.push_str("\nUSER MESSAGE:\n");
    out.push_str(new_message);
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
    fn unconnected_providers_listed_when_none_connected() {
        let convo = Conversation::new(ConversationId::new(), UserId::new(), "t");
        let prompt = build_chat_system_prompt(&convo, &[], &[]);
        assert!(prompt.contains("No integrations are connected."));
        assert!(prompt.contains("gmail"));
    }

    #[test]
    fn user_prompt_has_history_then_message() {
        let prompt = build_chat_user_prompt(&[], "hello there");
        assert!(prompt.starts_with("CONVERSATION HISTORY:\n"));
        assert!(prompt.ends_with("USER MESSAGE:\nhello there"));
    }
}
