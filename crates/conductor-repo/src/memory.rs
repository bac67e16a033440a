use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_core::{
    conversation::ConversationStatus,
    ids::{ConversationId, IntegrationId, NotificationId, TaskId, UserId},
    task::TaskStatus,
    Conversation, Integration, Message, Notification, Task,
};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{RepoError, Result};
use crate::traits::Repository;

/// Everything the in-memory store holds, behind one mutex — mirroring the
/// teacher's `SessionManager { db: Mutex<Connection> }` shape, with
/// `HashMap`s standing in for tables and two `HashSet`s standing in for
/// the row-level locks a real database would hold for the lifetime of a
/// claiming transaction.
#[derive(Default)]
struct Store {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
    tasks: HashMap<String, Task>,
    integrations: HashMap<String, Integration>,
    notifications: HashMap<String, Notification>,
    claimed_conversations: HashSet<String>,
    claimed_tasks: HashSet<String>,
}

/// Reference `Repository` implementation for tests and single-process
/// deployments. Not crash-safe and not shared across processes — a
/// production deployment swaps this for a SQL-backed implementation of
/// the same trait.
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn conversation_is_ready(c: &Conversation, now: DateTime<Utc>) -> bool {
    c.status == ConversationStatus::Background
        && c.schedule.is_some()
        && c.next_run_at.is_some_and(|t| t <= now)
}

fn task_is_ready(t: &Task, now: DateTime<Utc>) -> bool {
    t.status == TaskStatus::Active && t.next_run_at.is_some_and(|t| t <= now)
}

#[async_trait]
impl Repository for InMemoryRepository {
    #[instrument(skip(self, conversation))]
    async fn create_conversation(&self, conversation: Conversation) -> Result<()> {
        let mut store = self.store.lock().await;
        store
            .conversations
            .insert(conversation.id.as_str().to_string(), conversation);
        Ok(())
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let store = self.store.lock().await;
        store
            .conversations
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| RepoError::ConversationNotFound(id.clone()))
    }

    async fn update_conversation(&self, conversation: Conversation) -> Result<()> {
        let mut store = self.store.lock().await;
        store
            .conversations
            .insert(conversation.id.as_str().to_string(), conversation);
        Ok(())
    }

    async fn list_conversations_for_user(&self, user_id: &UserId) -> Result<Vec<Conversation>> {
        let store = self.store.lock().await;
        Ok(store
            .conversations
            .values()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn append_message(&self, message: Message) -> Result<()> {
        let mut store = self.store.lock().await;
        store
            .messages
            .entry(message.conversation_id.as_str().to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let store = self.store.lock().await;
        let all = store
            .messages
            .get(conversation_id.as_str())
            .cloned()
            .unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn create_task(&self, task: Task) -> Result<()> {
        let mut store = self.store.lock().await;
        store.tasks.insert(task.id.as_str().to_string(), task);
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task> {
        let store = self.store.lock().await;
        store
            .tasks
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| RepoError::TaskNotFound(id.clone()))
    }

    async fn update_task(&self, task: Task) -> Result<()> {
        let mut store = self.store.lock().await;
        store.tasks.insert(task.id.as_str().to_string(), task);
        Ok(())
    }

    async fn list_tasks_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Task>> {
        let store = self.store.lock().await;
        Ok(store
            .tasks
            .values()
            .filter(|t| &t.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn find_task_by_name(
        &self,
        conversation_id: &ConversationId,
        name: &str,
    ) -> Result<Option<Task>> {
        let store = self.store.lock().await;
        Ok(store
            .tasks
            .values()
            .find(|t| &t.conversation_id == conversation_id && t.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn create_integration(&self, integration: Integration) -> Result<()> {
        let mut store = self.store.lock().await;
        store
            .integrations
            .insert(integration.id.as_str().to_string(), integration);
        Ok(())
    }

    async fn list_integrations_for_user(&self, user_id: &UserId) -> Result<Vec<Integration>> {
        let store = self.store.lock().await;
        Ok(store
            .integrations
            .values()
            .filter(|i| &i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_integration(&self, id: &IntegrationId) -> Result<Integration> {
        let store = self.store.lock().await;
        store
            .integrations
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| RepoError::IntegrationNotFound(id.as_str().to_string()))
    }

    async fn create_notification(&self, notification: Notification) -> Result<()> {
        let mut store = self.store.lock().await;
        store
            .notifications
            .insert(notification.id.as_str().to_string(), notification);
        Ok(())
    }

    async fn list_notifications_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>> {
        let store = self.store.lock().await;
        Ok(store
            .notifications
            .values()
            .filter(|n| &n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<()> {
        let mut store = self.store.lock().await;
        let notification = store
            .notifications
            .get_mut(id.as_str())
            .ok_or_else(|| RepoError::NotificationNotFound(id.as_str().to_string()))?;
        notification.read = true;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn claim_ready_conversations(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Conversation>> {
        let mut store = self.store.lock().await;
        let ready_ids: Vec<String> = store
            .conversations
            .values()
            .filter(|c| conversation_is_ready(c, now) && !store.claimed_conversations.contains(c.id.as_str()))
            .take(limit)
            .map(|c| c.id.as_str().to_string())
            .collect();

        let mut claimed = Vec::with_capacity(ready_ids.len());
        for id in ready_ids {
            store.claimed_conversations.insert(id.clone());
            if let Some(c) = store.conversations.get(&id) {
                tracing::debug!(conversation_id = %id, "claimed ready conversation");
                claimed.push(c.clone());
            }
        }
        Ok(claimed)
    }

    async fn release_conversation_claim(&self, id: &ConversationId) {
        let mut store = self.store.lock().await;
        store.claimed_conversations.remove(id.as_str());
    }

    #[instrument(skip(self))]
    async fn claim_ready_tasks(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut store = self.store.lock().await;
        let ready_ids: Vec<String> = store
            .tasks
            .values()
            .filter(|t| task_is_ready(t, now) && !store.claimed_tasks.contains(t.id.as_str()))
            .take(limit)
            .map(|t| t.id.as_str().to_string())
            .collect();

        let mut claimed = Vec::with_capacity(ready_ids.len());
        for id in ready_ids {
            store.claimed_tasks.insert(id.clone());
            if let Some(t) = store.tasks.get(&id) {
                tracing::debug!(task_id = %id, "claimed ready task");
                claimed.push(t.clone());
            }
        }
        Ok(claimed)
    }

    async fn release_task_claim(&self, id: &TaskId) {
        let mut store = self.store.lock().await;
        store.claimed_tasks.remove(id.as_str());
    }
}
