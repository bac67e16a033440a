use conductor_core::task::IntervalUnit;
use serde::Deserialize;

/// Shape of the `create_task` payload. Exactly one of
/// `interval_value`+`interval_unit` or `cron_expression` must be set —
/// validated by [`crate::processor`], not here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interval_value: Option<u64>,
    #[serde(default)]
    pub interval_unit: Option<IntervalUnit>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub max_runs: Option<u32>,
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}
