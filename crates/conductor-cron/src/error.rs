use thiserror::Error;

/// Mirrors the shape of `skynet-scheduler`'s `SchedulerError`: a small,
/// named taxonomy rather than a string-only error.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("bad cron expression {expr:?}: {reason}")]
    BadExpression { expr: String, reason: String },

    #[error("no run of {expr:?} falls within the lookahead window")]
    Unreachable { expr: String },
}

pub type Result<T> = std::result::Result<T, CronError>;
