use conductor_core::ids::ConversationId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation {0} not found")]
    NotFound(ConversationId),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Llm(#[from] conductor_llm::LlmError),

    #[error(transparent)]
    Repo(#[from] conductor_repo::RepoError),

    #[error(transparent)]
    Cron(#[from] conductor_cron::CronError),
}

pub type Result<T> = std::result::Result<T, ChatError>;
