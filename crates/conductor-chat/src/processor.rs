use chrono::Utc;
use conductor_assembler::{assemble, Decryptor};
use conductor_core::{
    conversation::{shallow_merge, PendingQuestion, PendingQuestionType, Schedule},
    ids::{ConversationId, TaskId},
    message::{MessageRole, MessageSource},
    task::{IntervalUnit, TaskSchedule, TaskStatus, MIN_INTERVAL_SECONDS},
    Conversation, ConversationStatus, Message, Skill, Task,
};
use conductor_llm::{InvocationPolicy, LlmClient};
use conductor_protocol::{classify_chat, ChatPrimary, DeleteTaskRef};
use conductor_repo::{RepoError, Repository};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ChatError, Result};
use crate::prompt::{build_chat_system_prompt, build_chat_user_prompt};
use crate::task_request::CreateTaskRequest;

/// Result of one completed chat turn.
pub struct ChatTurnResult {
    pub user_message: Message,
    pub assistant_message: Message,
    pub state_changed: bool,
    pub new_status: Option<ConversationStatus>,
}

/// Everything `process_chat_turn` needs beyond the conversation id and
/// user text. Bundled so the function signature doesn't grow a new
/// parameter every time a dependency is added.
pub struct ChatContext<'a> {
    pub repo: &'a dyn Repository,
    pub llm: &'a dyn LlmClient,
    pub skill_registry: &'a [Skill],
    pub decryptor: &'a dyn Decryptor,
    pub max_messages: usize,
}

/// Runs one interactive chat turn end to end. Strictly per-conversation:
/// no cross-conversation fan-out, and the whole sequence completes
/// synchronously from the caller's point of view.
pub async fn process_chat_turn(
    ctx: &ChatContext<'_>,
    conversation_id: &ConversationId,
    user_message_content: &str,
) -> Result<ChatTurnResult> {
    // Step 1: load the conversation.
    let mut conversation = match ctx.repo.get_conversation(conversation_id).await {
        Ok(c) => c,
        Err(RepoError::ConversationNotFound(id)) => return Err(ChatError::NotFound(id)),
        Err(e) => return Err(e.into()),
    };
    let was_waiting_input = conversation.status == ConversationStatus::WaitingInput;

    // Step 2: recent history.
    let history = ctx
        .repo
        .list_messages(conversation_id, ctx.max_messages)
        .await?;

    // Step 3: this conversation's tasks.
    let tasks = ctx.repo.list_tasks_for_conversation(conversation_id).await?;

    // Step 4: active integrations -> MCP assembly.
    let integrations = ctx
        .repo
        .list_integrations_for_user(&conversation.user_id)
        .await?;
    let assembled = assemble(
        None,
        None,
        &conversation.skills,
        ctx.skill_registry,
        &integrations,
        ctx.decryptor,
        conductor_core::ids::UserRole::User,
    );

    // Step 5: append the user message.
    let user_message = Message::new(
        conversation_id.clone(),
        MessageRole::User,
        user_message_content,
        MessageSource::Chat,
    );
    ctx.repo.append_message(user_message.clone()).await?;

    // Step 6/7: prompts.
    let system_prompt_body = build_chat_system_prompt(&conversation, &integrations, &tasks);
    let system_prompt = match &assembled.system_prompt {
        Some(skill_prompt) => format!("{system_prompt_body}\n\n{skill_prompt}"),
        None => system_prompt_body,
    };
    let user_prompt = build_chat_user_prompt(&history, user_message_content);

    // Step 8: invoke the LLM.
    let policy = InvocationPolicy::new(Duration::from_secs(120));
    let mut plan = assembled
        .clone()
        .into_query_plan(user_prompt, conversation.claude_session_id.clone(), policy);
    plan.system_prompt = Some(system_prompt);
    let outcome = ctx.llm.run(plan).await?;

    // Step 9: classify and apply effects.
    let classification = classify_chat(&outcome.response);
    let now = Utc::now();
    let mut state_changed = false;

    match &classification.primary {
        ChatPrimary::CreateSchedule(spec) => {
            apply_create_schedule(&mut conversation, spec, now)?;
            state_changed = true;
        }
        ChatPrimary::NeedsInput(spec) => {
            conversation.status = ConversationStatus::WaitingInput;
            conversation.pending_question = Some(PendingQuestion {
                kind: parse_pending_question_type(&spec.kind),
                prompt: spec.prompt.clone(),
                options: spec.options.clone(),
            });
            state_changed = true;
        }
        ChatPrimary::StateUpdate(patch) => {
            if let Some(obj) = patch.as_object() {
                shallow_merge(&mut conversation.state.data, obj);
            }
            state_changed = true;
        }
        ChatPrimary::Plain => {
            if was_waiting_input {
                conversation.pending_question = None;
                if conversation.schedule.is_some() {
                    conversation.status = ConversationStatus::Background;
                    conversation.next_run_at = compute_next_run(&conversation, now)?;
                } else {
                    conversation.status = ConversationStatus::Active;
                    conversation.next_run_at = None;
                }
                state_changed = true;
            }
        }
    }

    if let Some(create_task) = &classification.create_task {
        if let Ok(spec) = serde_json::from_value::<CreateTaskRequest>(create_task.clone()) {
            create_task_from_request(ctx, &conversation, spec, now).await?;
            state_changed = true;
        }
    }

    if let Some(delete_task) = &classification.delete_task {
        if apply_delete_task(ctx, conversation_id, delete_task).await? {
            state_changed = true;
        }
    }

    // Step 10: session id + updated_at always advance.
    conversation.claude_session_id = Some(outcome.session_id);
    conversation.updated_at = now;
    ctx.repo.update_conversation(conversation.clone()).await?;

    // Step 11: append the assistant message.
    let assistant_message = Message::new(
        conversation_id.clone(),
        MessageRole::Assistant,
        classification.message.clone(),
        MessageSource::Chat,
    );
    ctx.repo.append_message(assistant_message.clone()).await?;

    Ok(ChatTurnResult {
        user_message,
        assistant_message,
        state_changed,
        new_status: if state_changed {
            Some(conversation.status)
        } else {
            None
        },
    })
}

fn compute_next_run(conversation: &Conversation, now: chrono::DateTime<Utc>) -> Result<Option<chrono::DateTime<Utc>>> {
    match &conversation.schedule {
        Some(Schedule::Cron { cron_expression }) => Ok(Some(conductor_cron::next(cron_expression, now)?)),
        Some(Schedule::Scheduled { run_at }) => Ok(Some(*run_at)),
        Some(Schedule::Immediate) => Ok(Some(now)),
        None => Ok(None),
    }
}

fn apply_create_schedule(
    conversation: &mut Conversation,
    spec: &conductor_protocol::CreateSchedule,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    use conductor_protocol::ScheduleKind;

    let schedule = match spec.kind {
        ScheduleKind::Cron => {
            let expr = spec
                .cron_expression
                .clone()
                .ok_or_else(|| ChatError::Validation("create_schedule cron missing cron_expression".into()))?;
            if !conductor_cron::is_valid(&expr) {
                warn!(conversation_id = %conversation.id, cron_expression = %expr, "rejected invalid cron expression from create_schedule");
                return Err(ChatError::Validation(format!("invalid cron expression: {expr}")));
            }
            Schedule::Cron { cron_expression: expr }
        }
        ScheduleKind::Scheduled => {
            let run_at = spec
                .run_at
                .as_deref()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| ChatError::Validation("create_schedule scheduled missing valid run_at".into()))?;
            Schedule::Scheduled { run_at }
        }
        ScheduleKind::Immediate => Schedule::Immediate,
    };

    conversation.next_run_at = Some(match &schedule {
        Schedule::Cron { cron_expression } => conductor_cron::next(cron_expression, now)?,
        Schedule::Scheduled { run_at } => *run_at,
        Schedule::Immediate => now,
    });
    info!(conversation_id = %conversation.id, "created schedule from chat turn, moving conversation to background");
    conversation.schedule = Some(schedule);
    conversation.status = ConversationStatus::Background;
    conversation.pending_question = None;

    if let Some(initial_state) = &spec.initial_state {
        let obj = initial_state.as_object();
        conversation.state.context = obj
            .and_then(|o| o.get("context"))
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        conversation.state.step = obj
            .and_then(|o| o.get("step"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "initial".to_string());
        conversation.state.data = obj
            .and_then(|o| o.get("data"))
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
    }

    Ok(())
}

fn parse_pending_question_type(kind: &str) -> PendingQuestionType {
    match kind {
        "choice" => PendingQuestionType::Choice,
        "confirmation" => PendingQuestionType::Confirmation,
        _ => PendingQuestionType::Input,
    }
}

/// Validates and persists a `create_task` request: rejects sub-15s
/// intervals and shapes missing both interval and cron.
async fn create_task_from_request(
    ctx: &ChatContext<'_>,
    conversation: &Conversation,
    spec: CreateTaskRequest,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    let schedule = match (spec.interval_value, spec.cron_expression.as_ref()) {
        (Some(value), None) => {
            let unit = spec.interval_unit.unwrap_or(IntervalUnit::Seconds);
            if unit.as_seconds(value) < MIN_INTERVAL_SECONDS {
                warn!(conversation_id = %conversation.id, interval_seconds = unit.as_seconds(value), "rejected create_task interval below minimum");
                return Err(ChatError::Validation(format!(
                    "interval must be at least {MIN_INTERVAL_SECONDS}s"
                )));
            }
            TaskSchedule::Interval { value, unit }
        }
        (None, Some(expr)) => {
            if !conductor_cron::is_valid(expr) {
                warn!(conversation_id = %conversation.id, cron_expression = %expr, "rejected invalid cron expression from create_task");
                return Err(ChatError::Validation(format!("invalid cron expression: {expr}")));
            }
            TaskSchedule::Cron {
                expression: expr.clone(),
            }
        }
        _ => {
            return Err(ChatError::Validation(
                "create_task requires exactly one of interval or cron".into(),
            ))
        }
    };

    let next_run_at = match &schedule {
        TaskSchedule::Cron { expression } => conductor_cron::next(expression, now)?,
        TaskSchedule::Interval { value, unit } => now + chrono::Duration::seconds(unit.as_seconds(*value)),
    };

    let expires_at = spec
        .expires_in_seconds
        .map(|secs| now + chrono::Duration::seconds(secs));

    let task = Task {
        id: TaskId::new(),
        conversation_id: conversation.id.clone(),
        user_id: conversation.user_id.clone(),
        name: spec.name,
        description: spec.description.unwrap_or_default(),
        status: TaskStatus::Active,
        schedule,
        next_run_at: Some(next_run_at),
        last_run_at: None,
        max_runs: spec.max_runs,
        current_runs: 0,
        expires_at,
        task_context: serde_json::Map::new(),
        consecutive_failures: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
    };

    info!(conversation_id = %conversation.id, task_name = %task.name, "created task from chat turn");
    ctx.repo.create_task(task).await?;
    Ok(())
}

async fn apply_delete_task(
    ctx: &ChatContext<'_>,
    conversation_id: &ConversationId,
    spec: &DeleteTaskRef,
) -> Result<bool> {
    let task = if let Some(id) = &spec.task_id {
        ctx.repo.get_task(&TaskId(id.clone())).await.ok()
    } else if let Some(name) = &spec.task_name {
        ctx.repo.find_task_by_name(conversation_id, name).await?
    } else {
        None
    };

    let Some(mut task) = task else {
        return Ok(false);
    };

    task.status = TaskStatus::Deleted;
    task.next_run_at = None;
    task.updated_at = Utc::now();
    info!(conversation_id = %conversation_id, task_id = %task.id, "deleted task from chat turn");
    ctx.repo.update_task(task).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_assembler::AssemblerError;
    use conductor_core::ids::UserId;
    use conductor_llm::ScriptedLlmClient;
    use conductor_repo::InMemoryRepository;

    struct NoopDecryptor;

    impl Decryptor for NoopDecryptor {
        fn decrypt(&self, _ciphertext: &[u8]) -> conductor_assembler::Result<String> {
            Err(AssemblerError::Decryption("no integrations in these tests".into()))
        }
    }

    async fn new_conversation(repo: &InMemoryRepository) -> Conversation {
        let conversation = Conversation::new(ConversationId::new(), UserId::new(), "test chat");
        repo.create_conversation(conversation.clone()).await.unwrap();
        conversation
    }

    #[tokio::test]
    async fn chat_creates_cron_schedule() {
        let repo = InMemoryRepository::new();
        let conversation = new_conversation(&repo).await;
        let llm = ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text(
                "sess-1",
                r#"{"create_schedule": {"type": "cron", "cron_expression": "0 9 * * *", "initial_state": {"context": {"task": "check email"}}}, "message": "Will do, every morning at 9."}"#,
            ))],
        );
        let decryptor = NoopDecryptor;
        let ctx = ChatContext {
            repo: &repo,
            llm: &llm,
            skill_registry: &[],
            decryptor: &decryptor,
            max_messages: 20,
        };

        let result = process_chat_turn(&ctx, &conversation.id, "check my email every morning at 9")
            .await
            .unwrap();

        assert!(result.state_changed);
        assert_eq!(result.new_status, Some(ConversationStatus::Background));
        assert_eq!(result.assistant_message.content, "Will do, every morning at 9.");

        let stored = repo.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.status, ConversationStatus::Background);
        assert!(matches!(stored.schedule, Some(Schedule::Cron { .. })));
        assert!(stored.next_run_at.is_some());
        assert_eq!(
            stored.state.context.get("task").and_then(|v| v.as_str()),
            Some("check email")
        );

        let messages = repo.list_messages(&conversation.id, 20).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn task_creation_from_chat_sets_next_run() {
        let repo = InMemoryRepository::new();
        let conversation = new_conversation(&repo).await;
        let llm = ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text(
                "sess-1",
                r#"{"create_task": {"name": "reminder", "intervalValue": 15, "intervalUnit": "seconds", "maxRuns": 3}, "message": "Set up."}"#,
            ))],
        );
        let decryptor = NoopDecryptor;
        let ctx = ChatContext {
            repo: &repo,
            llm: &llm,
            skill_registry: &[],
            decryptor: &decryptor,
            max_messages: 20,
        };

        let before = Utc::now();
        let result = process_chat_turn(&ctx, &conversation.id, "remind me every 15 seconds, 3 times")
            .await
            .unwrap();
        assert!(result.state_changed);

        let tasks = repo
            .list_tasks_for_conversation(&conversation.id)
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.name, "reminder");
        assert_eq!(task.max_runs, Some(3));
        assert_eq!(task.current_runs, 0);
        assert_eq!(task.status, TaskStatus::Active);
        let next_run_at = task.next_run_at.expect("next_run_at set");
        let delta = (next_run_at - before).num_seconds();
        assert!((14..=16).contains(&delta), "expected ~15s, got {delta}s");
    }

    #[tokio::test]
    async fn plain_reply_clears_waiting_input_without_schedule() {
        let repo = InMemoryRepository::new();
        let mut conversation = new_conversation(&repo).await;
        conversation.status = ConversationStatus::WaitingInput;
        conversation.pending_question = Some(PendingQuestion {
            kind: PendingQuestionType::Input,
            prompt: "What's your timezone?".into(),
            options: None,
        });
        repo.update_conversation(conversation.clone()).await.unwrap();

        let llm = ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text("sess-1", "Thanks, got it."))],
        );
        let decryptor = NoopDecryptor;
        let ctx = ChatContext {
            repo: &repo,
            llm: &llm,
            skill_registry: &[],
            decryptor: &decryptor,
            max_messages: 20,
        };

        let result = process_chat_turn(&ctx, &conversation.id, "PST").await.unwrap();
        assert_eq!(result.new_status, Some(ConversationStatus::Active));

        let stored = repo.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.status, ConversationStatus::Active);
        assert!(stored.pending_question.is_none());
        assert!(stored.next_run_at.is_none());
    }

    #[tokio::test]
    async fn delete_task_by_name_soft_deletes() {
        let repo = InMemoryRepository::new();
        let conversation = new_conversation(&repo).await;
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            conversation_id: conversation.id.clone(),
            user_id: conversation.user_id.clone(),
            name: "daily digest".into(),
            description: String::new(),
            status: TaskStatus::Active,
            schedule: TaskSchedule::Interval {
                value: 60,
                unit: IntervalUnit::Seconds,
            },
            next_run_at: Some(now),
            last_run_at: None,
            max_runs: None,
            current_runs: 0,
            expires_at: None,
            task_context: serde_json::Map::new(),
            consecutive_failures: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        repo.create_task(task).await.unwrap();

        let llm = ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text(
                "sess-1",
                r#"{"delete_task": {"taskName": "daily digest"}, "message": "Deleted."}"#,
            ))],
        );
        let decryptor = NoopDecryptor;
        let ctx = ChatContext {
            repo: &repo,
            llm: &llm,
            skill_registry: &[],
            decryptor: &decryptor,
            max_messages: 20,
        };

        let result = process_chat_turn(&ctx, &conversation.id, "cancel the daily digest")
            .await
            .unwrap();
        assert!(result.state_changed);

        let tasks = repo
            .list_tasks_for_conversation(&conversation.id)
            .await
            .unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Deleted);
        assert!(tasks[0].next_run_at.is_none());
    }
}

