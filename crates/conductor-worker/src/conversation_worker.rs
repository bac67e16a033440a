use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conductor_assembler::{assemble, Decryptor};
use conductor_core::{
    conversation::{shallow_merge, PendingQuestion, PendingQuestionType, Schedule},
    ids::UserRole,
    Conversation, ConversationStatus, Message, MessageRole, MessageSource, Notification, Skill,
};
use conductor_config::WorkerConfig;
use conductor_llm::{InvocationPolicy, LlmClient, LlmError};
use conductor_protocol::{classify_worker, WorkerDirective};
use conductor_repo::Repository;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::prompt::{build_worker_system_prompt, build_worker_user_prompt};

/// Background conversation worker: a polling loop that claims due
/// `background` conversations and resumes each one's cron/interval/
/// immediate cycle.
#[derive(Clone)]
pub struct ConversationWorker {
    repo: Arc<dyn Repository>,
    llm: Arc<dyn LlmClient>,
    skill_registry: Arc<[Skill]>,
    decryptor: Arc<dyn Decryptor>,
    config: WorkerConfig,
    active_count: Arc<AtomicUsize>,
}

impl ConversationWorker {
    pub fn new(
        repo: Arc<dyn Repository>,
        llm: Arc<dyn LlmClient>,
        skill_registry: Arc<[Skill]>,
        decryptor: Arc<dyn Decryptor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            repo,
            llm,
            skill_registry,
            decryptor,
            config,
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Polls every `poll_interval_ms` until `shutdown` broadcasts `true`.
    /// In-flight executions are allowed to finish; no hard cancellation.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("conversation worker started");
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "conversation worker tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("conversation worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) -> Result<()> {
        let active = self.active_count.load(Ordering::SeqCst);
        if active >= self.config.max_concurrent {
            return Ok(());
        }
        let capacity = self.config.max_concurrent - active;
        let claimed = self
            .repo
            .claim_ready_conversations(capacity, Utc::now())
            .await?;

        for conversation in claimed {
            self.active_count.fetch_add(1, Ordering::SeqCst);
            let worker = self.clone();
            tokio::spawn(async move {
                let id = conversation.id.clone();
                if let Err(e) = worker.execute(conversation).await {
                    error!(conversation_id = %id, error = %e, "conversation cycle failed");
                }
                worker.repo.release_conversation_claim(&id).await;
                worker.active_count.fetch_sub(1, Ordering::SeqCst);
            });
        }
        Ok(())
    }

    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn execute(&self, mut conversation: Conversation) -> Result<()> {
        let history = self
            .repo
            .list_messages(&conversation.id, self.config.max_messages_to_include)
            .await?;
        let integrations = self
            .repo
            .list_integrations_for_user(&conversation.user_id)
            .await?;
        let assembled = assemble(
            None,
            None,
            &conversation.skills,
            &self.skill_registry,
            &integrations,
            self.decryptor.as_ref(),
            UserRole::User,
        );

        let system_prompt_body = build_worker_system_prompt(&conversation);
        let system_prompt = match &assembled.system_prompt {
            Some(skill_prompt) => format!("{system_prompt_body}\n\n{skill_prompt}"),
            None => system_prompt_body,
        };
        let user_prompt = build_worker_user_prompt(&conversation, &history);

        let policy = InvocationPolicy::new(Duration::from_millis(self.config.execution_timeout_ms));
        let mut plan = assembled.into_query_plan(
            user_prompt,
            conversation.claude_session_id.clone(),
            policy,
        );
        plan.system_prompt = Some(system_prompt);

        let outcome = match tokio::time::timeout(
            Duration::from_millis(self.config.execution_timeout_ms),
            self.llm.run(plan),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return self.handle_execution_error(&mut conversation, e).await,
            Err(_) => {
                let e = LlmError::Timeout(Duration::from_millis(self.config.execution_timeout_ms));
                return self.handle_execution_error(&mut conversation, e).await;
            }
        };

        let now = Utc::now();
        let classification = classify_worker(&outcome.response);

        match classification.directive {
            WorkerDirective::NeedsInput { question } => {
                self.append_worker_message(&conversation.id, &classification.message)
                    .await?;
                conversation.status = ConversationStatus::WaitingInput;
                conversation.pending_question = Some(PendingQuestion {
                    kind: question
                        .get("type")
                        .and_then(|v| v.as_str())
                        .map(parse_pending_question_type)
                        .unwrap_or(PendingQuestionType::Input),
                    prompt: question
                        .get("prompt")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    options: question.get("options").and_then(|v| {
                        v.as_array().map(|a| {
                            a.iter()
                                .filter_map(|e| e.as_str().map(str::to_string))
                                .collect()
                        })
                    }),
                });
                self.repo
                    .create_notification(Notification::new(
                        conversation.user_id.clone(),
                        Some(conversation.id.clone()),
                        conversation.title.clone(),
                        classification.message.clone(),
                    ))
                    .await?;
            }
            WorkerDirective::Complete => {
                self.append_worker_message(&conversation.id, &classification.message)
                    .await?;
                if matches!(conversation.schedule, Some(Schedule::Cron { .. })) {
                    conversation.next_run_at = self.compute_next_run(&conversation, now)?;
                } else {
                    conversation.status = ConversationStatus::Active;
                    conversation.schedule = None;
                    conversation.next_run_at = None;
                    self.repo
                        .create_notification(Notification::new(
                            conversation.user_id.clone(),
                            Some(conversation.id.clone()),
                            format!("{} complete", conversation.title),
                            classification.message.clone(),
                        ))
                        .await?;
                }
            }
            WorkerDirective::Continue => {
                if !classification.message.trim().is_empty() {
                    self.append_worker_message(&conversation.id, &classification.message)
                        .await?;
                }
                if let Some(patch) = classification.state_update.as_ref().and_then(|v| v.as_object()) {
                    shallow_merge(&mut conversation.state.data, patch);
                }
                if let Some(next_step) = classification.next_step {
                    conversation.state.step = next_step;
                }
                conversation.next_run_at = self.compute_next_run(&conversation, now)?;
            }
        }

        conversation.consecutive_failures = 0;
        conversation.claude_session_id = Some(outcome.session_id);
        conversation.updated_at = now;
        self.repo.update_conversation(conversation).await?;
        Ok(())
    }

    async fn handle_execution_error(
        &self,
        conversation: &mut Conversation,
        error: LlmError,
    ) -> Result<()> {
        if error.looks_like_auth_expiry() {
            warn!(conversation_id = %conversation.id, "auth-like error, pausing conversation for reconnect");
            conversation.status = ConversationStatus::WaitingInput;
            conversation.pending_question = Some(PendingQuestion {
                kind: PendingQuestionType::Input,
                prompt: "Your connection has expired. Please reconnect in Settings.".to_string(),
                options: None,
            });
            self.repo
                .create_notification(Notification::new(
                    conversation.user_id.clone(),
                    Some(conversation.id.clone()),
                    conversation.title.clone(),
                    "Your connection has expired. Please reconnect in Settings.".to_string(),
                ))
                .await?;
        } else {
            conversation.consecutive_failures += 1;
            debug!(conversation_id = %conversation.id, failures = conversation.consecutive_failures, "conversation cycle failed transiently");
            if conversation.consecutive_failures >= self.config.max_retries {
                self.repo
                    .create_notification(Notification::new(
                        conversation.user_id.clone(),
                        Some(conversation.id.clone()),
                        "Task error".to_string(),
                        error.to_string(),
                    ))
                    .await?;
            }
        }
        conversation.updated_at = Utc::now();
        self.repo.update_conversation(conversation.clone()).await?;
        Ok(())
    }

    fn compute_next_run(
        &self,
        conversation: &Conversation,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<chrono::DateTime<Utc>>> {
        match &conversation.schedule {
            Some(Schedule::Cron { cron_expression }) => {
                Ok(Some(conductor_cron::next(cron_expression, now)?))
            }
            Some(Schedule::Scheduled { run_at }) => Ok(Some(*run_at)),
            Some(Schedule::Immediate) => Ok(Some(now)),
            None => Ok(None),
        }
    }

    async fn append_worker_message(
        &self,
        conversation_id: &conductor_core::ids::ConversationId,
        content: &str,
    ) -> Result<()> {
        let message = Message::new(
            conversation_id.clone(),
            MessageRole::Assistant,
            content,
            MessageSource::Worker,
        );
        self.repo.append_message(message).await?;
        Ok(())
    }
}

fn parse_pending_question_type(kind: &str) -> PendingQuestionType {
    match kind {
        "choice" => PendingQuestionType::Choice,
        "confirmation" => PendingQuestionType::Confirmation,
        _ => PendingQuestionType::Input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_assembler::AssemblerError;
    use conductor_core::ids::{ConversationId, UserId};
    use conductor_llm::ScriptedLlmClient;
    use conductor_repo::InMemoryRepository;

    struct NoopDecryptor;
    impl Decryptor for NoopDecryptor {
        fn decrypt(&self, _ciphertext: &[u8]) -> conductor_assembler::Result<String> {
            Err(AssemblerError::Decryption("no integrations in these tests".into()))
        }
    }

    fn worker(repo: Arc<dyn Repository>, llm: Arc<dyn LlmClient>) -> ConversationWorker {
        ConversationWorker::new(
            repo,
            llm,
            Arc::from(Vec::<Skill>::new()),
            Arc::new(NoopDecryptor),
            WorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn worker_auth_error_pauses_conversation() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let mut conversation = Conversation::new(ConversationId::new(), UserId::new(), "daily sync");
        conversation.status = ConversationStatus::Background;
        conversation.schedule = Some(Schedule::Immediate);
        repo.create_conversation(conversation.clone()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(
            "mock",
            vec![Err(LlmError::Api {
                status: 401,
                message: "OAuth token expired".into(),
            })],
        ));
        let w = worker(repo.clone(), llm);
        w.execute(conversation.clone()).await.unwrap();

        let stored = repo.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.status, ConversationStatus::WaitingInput);
        let q = stored.pending_question.expect("pending question set");
        assert_eq!(q.kind, PendingQuestionType::Input);
        assert!(q.prompt.contains("expired"));

        let notifications = repo
            .list_notifications_for_user(&conversation.user_id)
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn complete_on_non_cron_schedule_returns_to_active() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let mut conversation = Conversation::new(ConversationId::new(), UserId::new(), "one shot");
        conversation.status = ConversationStatus::Background;
        conversation.schedule = Some(Schedule::Immediate);
        repo.create_conversation(conversation.clone()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text("s1", r#"{"complete": true, "message": "all done"}"#))],
        ));
        let w = worker(repo.clone(), llm);
        w.execute(conversation.clone()).await.unwrap();

        let stored = repo.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.status, ConversationStatus::Active);
        assert!(stored.schedule.is_none());
        assert!(stored.next_run_at.is_none());
    }

    #[tokio::test]
    async fn continue_recomputes_next_run_for_immediate_schedule() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let mut conversation = Conversation::new(ConversationId::new(), UserId::new(), "loop");
        conversation.status = ConversationStatus::Background;
        conversation.schedule = Some(Schedule::Immediate);
        repo.create_conversation(conversation.clone()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text(
                "s1",
                r#"{"state_update": {"runs": 1}, "message": "still working"}"#,
            ))],
        ));
        let w = worker(repo.clone(), llm);
        w.execute(conversation.clone()).await.unwrap();

        let stored = repo.get_conversation(&conversation.id).await.unwrap();
        assert!(stored.next_run_at.is_some());
        assert_eq!(stored.state.data.get("runs").and_then(|v| v.as_i64()), Some(1));
        assert_eq!(stored.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn continue_overwrites_step_when_next_step_given() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let mut conversation = Conversation::new(ConversationId::new(), UserId::new(), "loop");
        conversation.status = ConversationStatus::Background;
        conversation.schedule = Some(Schedule::Immediate);
        conversation.state.step = "start".to_string();
        repo.create_conversation(conversation.clone()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text(
                "s1",
                r#"{"next_step": "awaiting_approval", "message": "moving on"}"#,
            ))],
        ));
        let w = worker(repo.clone(), llm);
        w.execute(conversation.clone()).await.unwrap();

        let stored = repo.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(stored.state.step, "awaiting_approval");
    }
}
