//! `conductor-core` — shared data model for long-running LLM-backed agents:
//! conversations, messages, tasks, integrations, notifications, skills, and
//! the user/role records the rest of the system keys ownership off of.

pub mod conversation;
pub mod ids;
pub mod integration;
pub mod message;
pub mod notification;
pub mod skill;
pub mod task;
pub mod user;

pub use conversation::{
    shallow_merge, Conversation, ConversationState, ConversationStatus, PendingQuestion,
    PendingQuestionType, Schedule,
};
pub use ids::{
    ConversationId, IntegrationId, MessageId, NotificationId, TaskId, UserId, UserRole,
};
pub use integration::Integration;
pub use message::{Message, MessageRole, MessageSource};
pub use notification::Notification;
pub use skill::{merge as merge_skills, McpServerSpec, MergedSkills, Skill, SubAgentSpec};
pub use task::{IntervalUnit, Task, TaskSchedule, TaskStatus, MIN_INTERVAL_SECONDS};
pub use user::User;
