use thiserror::Error;

/// Errors a single conversation/task execution can raise internally.
/// Never escapes a poll tick: both worker loops log and absorb these.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Llm(#[from] conductor_llm::LlmError),

    #[error(transparent)]
    Repo(#[from] conductor_repo::RepoError),

    #[error(transparent)]
    Cron(#[from] conductor_cron::CronError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
