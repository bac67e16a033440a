use conductor_core::ids::{ConversationId, TaskId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("integration {0} not found")]
    IntegrationNotFound(String),

    #[error("notification {0} not found")]
    NotificationNotFound(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;
