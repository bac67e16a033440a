//! Chat turn processor: the synchronous, per-conversation pipeline that
//! turns one user message into a classified LLM response and the
//! conversation-state effects it implies.

mod error;
mod processor;
mod prompt;
mod task_request;

pub use error::{ChatError, Result};
pub use processor::{process_chat_turn, ChatContext, ChatTurnResult};
