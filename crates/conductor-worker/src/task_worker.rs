use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conductor_assembler::{assemble, Decryptor};
use conductor_core::{
    ids::{TaskId, UserRole},
    task::TaskStatus,
    Message, MessageRole, MessageSource, Notification, Skill, Task,
};
use conductor_config::WorkerConfig;
use conductor_llm::{InvocationPolicy, LlmClient};
use conductor_repo::{RepoError, Repository};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::error::Result;
use crate::prompt::{build_task_system_prompt, build_task_user_prompt};

const TASK_NOTIFICATION_BODY_CHARS: usize = 100;

/// Task worker: structurally identical polling loop to
/// [`crate::ConversationWorker`], but claims named tasks and always
/// invokes the LLM in a fresh session.
#[derive(Clone)]
pub struct TaskWorker {
    repo: Arc<dyn Repository>,
    llm: Arc<dyn LlmClient>,
    skill_registry: Arc<[Skill]>,
    decryptor: Arc<dyn Decryptor>,
    config: WorkerConfig,
    active_count: Arc<AtomicUsize>,
}

impl TaskWorker {
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

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("task worker started");
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "task worker tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("task worker shutting down");
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
        let claimed = self.repo.claim_ready_tasks(capacity, Utc::now()).await?;

        for task in claimed {
            self.active_count.fetch_add(1, Ordering::SeqCst);
            let worker = self.clone();
            tokio::spawn(async move {
                let id = task.id.clone();
                if let Err(e) = worker.execute(task).await {
                    error!(task_id = %id, error = %e, "task cycle failed");
                }
                worker.repo.release_task_claim(&id).await;
                worker.active_count.fetch_sub(1, Ordering::SeqCst);
            });
        }
        Ok(())
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn execute(&self, mut task: Task) -> Result<()> {
        let conversation = match self.repo.get_conversation(&task.conversation_id).await {
            Ok(c) => c,
            Err(RepoError::ConversationNotFound(_)) => {
                task.status = TaskStatus::Completed;
                task.next_run_at = None;
                task.updated_at = Utc::now();
                task.last_error = Some("Conversation not found".to_string());
                self.repo.update_task(task).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let history = self
            .repo
            .list_messages(&task.conversation_id, self.config.max_messages_to_include)
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

        let system_prompt_body = build_task_system_prompt(&task);
        let system_prompt = match &assembled.system_prompt {
            Some(skill_prompt) => format!("{system_prompt_body}\n\n{skill_prompt}"),
            None => system_prompt_body,
        };
        let user_prompt = build_task_user_prompt(&task, &history);

        let policy = InvocationPolicy::new(Duration::from_millis(self.config.execution_timeout_ms));
        // Tasks never carry the conversation's session id: fresh sessions
        // so task runs don't collide with interactive use.
        let mut plan = assembled.into_query_plan(user_prompt, None, policy);
        plan.system_prompt = Some(system_prompt);

        let outcome = match tokio::time::timeout(
            Duration::from_millis(self.config.execution_timeout_ms),
            self.llm.run(plan),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return self.handle_execution_error(&mut task, e.to_string()).await,
            Err(_) => {
                return self
                    .handle_execution_error(
                        &mut task,
                        format!(
                            "llm call timed out after {:?}",
                            Duration::from_millis(self.config.execution_timeout_ms)
                        ),
                    )
                    .await
            }
        };

        let now = Utc::now();
        let message = Message::new(
            task.conversation_id.clone(),
            MessageRole::Assistant,
            outcome.response.clone(),
            MessageSource::Worker,
        );
        self.repo.append_message(message).await?;

        let body: String = outcome.response.chars().take(TASK_NOTIFICATION_BODY_CHARS).collect();
        self.repo
            .create_notification(Notification::new(
                conversation.user_id.clone(),
                Some(conversation.id.clone()),
                format!("Task: {}", task.name),
                body,
            ))
            .await?;

        task.current_runs += 1;
        task.last_run_at = Some(now);
        task.consecutive_failures = 0;
        task.last_error = None;
        task.updated_at = now;

        if task.max_runs_reached() || task.expired(now) {
            task.status = TaskStatus::Completed;
            task.next_run_at = None;
            self.repo
                .create_notification(Notification::new(
                    conversation.user_id.clone(),
                    Some(conversation.id.clone()),
                    format!("Task: {} complete", task.name),
                    format!("{} has finished running.", task.name),
                ))
                .await?;
        } else {
            task.next_run_at = Some(self.next_run_for(&task, now)?);
        }

        self.repo.update_task(task).await?;
        Ok(())
    }

    async fn handle_execution_error(&self, task: &mut Task, error_message: String) -> Result<()> {
        task.consecutive_failures += 1;
        task.last_error = Some(error_message.clone());
        task.updated_at = Utc::now();
        debug!(task_id = %task.id, failures = task.consecutive_failures, "task cycle failed transiently");

        if task.consecutive_failures >= self.config.max_retries {
            task.status = TaskStatus::Paused;
            task.next_run_at = None;
            if let Ok(conversation) = self.repo.get_conversation(&task.conversation_id).await {
                self.repo
                    .create_notification(Notification::new(
                        conversation.user_id,
                        Some(conversation.id),
                        format!("Task: {} paused", task.name),
                        format!("Paused after repeated failures: {error_message}"),
                    ))
                    .await?;
            }
        }
        self.repo.update_task(task.clone()).await?;
        Ok(())
    }

    fn next_run_for(&self, task: &Task, now: chrono::DateTime<Utc>) -> Result<chrono::DateTime<Utc>> {
        match &task.schedule {
            conductor_core::task::TaskSchedule::Cron { expression } => {
                Ok(conductor_cron::next(expression, now)?)
            }
            conductor_core::task::TaskSchedule::Interval { value, unit } => {
                Ok(now + chrono::Duration::seconds(unit.as_seconds(*value)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_assembler::AssemblerError;
    use conductor_core::ids::{ConversationId, UserId};
    use conductor_core::task::{IntervalUnit, TaskSchedule};
    use conductor_core::Conversation;
    use conductor_llm::ScriptedLlmClient;
    use conductor_repo::InMemoryRepository;

    struct NoopDecryptor;
    impl Decryptor for NoopDecryptor {
        fn decrypt(&self, _ciphertext: &[u8]) -> conductor_assembler::Result<String> {
            Err(AssemblerError::Decryption("no integrations in these tests".into()))
        }
    }

    fn worker(repo: Arc<dyn Repository>, llm: Arc<dyn LlmClient>) -> TaskWorker {
        TaskWorker::new(
            repo,
            llm,
            Arc::from(Vec::<Skill>::new()),
            Arc::new(NoopDecryptor),
            WorkerConfig::default(),
        )
    }

    fn sample_task(conversation_id: ConversationId, user_id: UserId) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::new(),
            conversation_id,
            user_id,
            name: "greet".into(),
            description: String::new(),
            status: TaskStatus::Active,
            schedule: TaskSchedule::Interval {
                value: 15,
                unit: IntervalUnit::Seconds,
            },
            next_run_at: Some(now),
            last_run_at: Some(now),
            max_runs: Some(2),
            current_runs: 1,
            expires_at: None,
            task_context: serde_json::Map::new(),
            consecutive_failures: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn task_execution_terminates_on_max_runs() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let conversation = Conversation::new(ConversationId::new(), UserId::new(), "greeter");
        repo.create_conversation(conversation.clone()).await.unwrap();
        let task = sample_task(conversation.id.clone(), conversation.user_id.clone());
        repo.create_task(task.clone()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text("s1", "Hello there, have a great day!"))],
        ));
        let w = worker(repo.clone(), llm);
        w.execute(task.clone()).await.unwrap();

        let stored = repo.get_task(&task.id).await.unwrap();
        assert_eq!(stored.current_runs, 2);
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(stored.next_run_at.is_none());

        let notifications = repo
            .list_notifications_for_user(&conversation.user_id)
            .await
            .unwrap();
        assert_eq!(notifications.len(), 2);
    }

    #[tokio::test]
    async fn missing_conversation_completes_task_with_reason() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let task = sample_task(ConversationId::new(), UserId::new());
        repo.create_task(task.clone()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new("mock", vec![]));
        let w = worker(repo.clone(), llm);
        w.execute(task.clone()).await.unwrap();

        let stored = repo.get_task(&task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.last_error.as_deref(), Some("Conversation not found"));
    }

    #[tokio::test]
    async fn task_increments_runs_and_sets_next_run_when_not_exhausted() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let conversation = Conversation::new(ConversationId::new(), UserId::new(), "greeter");
        repo.create_conversation(conversation.clone()).await.unwrap();
        let mut task = sample_task(conversation.id.clone(), conversation.user_id.clone());
        task.max_runs = Some(5);
        task.current_runs = 1;
        repo.create_task(task.clone()).await.unwrap();

        let before = Utc::now();
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(
            "mock",
            vec![Ok(ScriptedLlmClient::text("s1", "still going"))],
        ));
        let w = worker(repo.clone(), llm);
        w.execute(task.clone()).await.unwrap();

        let stored = repo.get_task(&task.id).await.unwrap();
        assert_eq!(stored.current_runs, 2);
        assert_eq!(stored.status, TaskStatus::Active);
        let next = stored.next_run_at.expect("next run set");
        let delta = (next - before).num_seconds();
        assert!((14..=16).contains(&delta));
    }
}
