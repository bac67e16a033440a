use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ConversationId, TaskId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Paused,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub fn as_seconds(&self, value: u64) -> i64 {
        let multiplier: i64 = match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3_600,
            IntervalUnit::Days => 86_400,
        };
        value as i64 * multiplier
    }
}

/// Exactly one of `Interval`/`Cron` is set on an active task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSchedule {
    Interval { value: u64, unit: IntervalUnit },
    Cron { expression: String },
}

/// Minimum effective interval in seconds.
pub const MIN_INTERVAL_SECONDS: i64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub schedule: TaskSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,
    #[serde(default)]
    pub current_runs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub task_context: Map<String, Value>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True once `current_runs` has caught up with `max_runs` (equality
    /// terminates the task).
    pub fn max_runs_reached(&self) -> bool {
        self.max_runs.is_some_and(|m| self.current_runs >= m)
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_unit_converts_to_seconds() {
        assert_eq!(IntervalUnit::Minutes.as_seconds(2), 120);
        assert_eq!(IntervalUnit::Hours.as_seconds(1), 3_600);
        assert_eq!(IntervalUnit::Days.as_seconds(1), 86_400);
    }

    #[test]
    fn max_runs_reached_is_inclusive() {
        let mut t = sample_task();
        t.max_runs = Some(2);
        t.current_runs = 1;
        assert!(!t.max_runs_reached());
        t.current_runs = 2;
        assert!(t.max_runs_reached());
    }

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::new(),
            conversation_id: ConversationId::new(),
            user_id: UserId::new(),
            name: "greet".into(),
            description: String::new(),
            status: TaskStatus::Active,
            schedule: TaskSchedule::Interval { value: 15, unit: IntervalUnit::Seconds },
            next_run_at: None,
            last_run_at: None,
            max_runs: None,
            current_runs: 0,
            expires_at: None,
            task_context: Map::new(),
            consecutive_failures: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
