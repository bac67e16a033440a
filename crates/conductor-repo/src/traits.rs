use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_core::{
    ids::{ConversationId, IntegrationId, NotificationId, TaskId, UserId},
    Conversation, Integration, Message, Notification, Task,
};

use crate::error::Result;

/// Abstract persistence port. The in-memory
/// [`crate::memory::InMemoryRepository`] realises it for tests and
/// single-process deployments; a SQL-backed implementation would satisfy
/// the same trait with `SELECT … FOR UPDATE SKIP LOCKED` underneath
/// `claim_ready_conversations`/`claim_ready_tasks`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_conversation(&self, conversation: Conversation) -> Result<()>;
    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation>;
    async fn update_conversation(&self, conversation: Conversation) -> Result<()>;
    async fn list_conversations_for_user(&self, user_id: &UserId) -> Result<Vec<Conversation>>;

    async fn append_message(&self, message: Message) -> Result<()>;
    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>>;

    async fn create_task(&self, task: Task) -> Result<()>;
    async fn get_task(&self, id: &TaskId) -> Result<Task>;
    async fn update_task(&self, task: Task) -> Result<()>;
    async fn list_tasks_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Task>>;
    async fn find_task_by_name(
        &self,
        conversation_id: &ConversationId,
        name: &str,
    ) -> Result<Option<Task>>;

    async fn create_integration(&self, integration: Integration) -> Result<()>;
    async fn list_integrations_for_user(&self, user_id: &UserId) -> Result<Vec<Integration>>;
    async fn get_integration(&self, id: &IntegrationId) -> Result<Integration>;

    async fn create_notification(&self, notification: Notification) -> Result<()>;
    async fn list_notifications_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, id: &NotificationId) -> Result<()>;

    /// Claims up to `limit` background conversations whose schedule has
    /// come due as of `now`, excluding rows already claimed by another
    /// in-flight worker cycle. Callers MUST release the claim via
    /// [`Repository::release_conversation_claim`] once processing
    /// finishes (success or failure) — the claim otherwise never clears.
    async fn claim_ready_conversations(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Conversation>>;

    async fn release_conversation_claim(&self, id: &ConversationId);

    /// Claims up to `limit` active tasks whose `next_run_at` has come due.
    /// Same claim/release contract as conversations.
    async fn claim_ready_tasks(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<Task>>;

    async fn release_task_claim(&self, id: &TaskId);
}
