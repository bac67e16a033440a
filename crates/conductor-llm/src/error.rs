use thiserror::Error;

/// Mirrors the shape of the reference system's `ProviderError`: a small
/// taxonomy distinguishing transport failure, API-level rejection, and
/// the two conditions the worker error policy treats specially —
/// timeouts and auth-shaped failures.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport error: {0}")]
    Transport(String),

    #[error("llm api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("llm call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("llm call cancelled")]
    Cancelled,
}

impl LlmError {
    /// The auth-expiry heuristic: any of these substrings, case-insensitive,
    /// anywhere in the error's rendered message.
    pub fn looks_like_auth_expiry(&self) -> bool {
        let text = self.to_string().to_lowercase();
        ["auth", "token", "expired", "unauthorized"]
            .iter()
            .any(|needle| text.contains(needle))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
