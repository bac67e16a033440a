//! Classifies raw LLM text responses into the structured directives the
//! rest of the system acts on. Two independent classifiers exist because
//! the same JSON shapes mean different things depending on who invoked
//! the model: a live chat turn, or a background worker cycle.

mod chat;
mod error;
mod extract;
mod worker;

pub use chat::{
    classify_chat, ChatClassification, ChatPrimary, CreateSchedule, DeleteTaskRef, NeedsInputChat,
    ScheduleKind,
};
pub use error::{ProtocolError, Result};
pub use extract::extract_json_object;
pub use worker::{classify_worker, WorkerClassification, WorkerDirective};
