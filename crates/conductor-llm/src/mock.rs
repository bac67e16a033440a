use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{LlmClient, RunOutcome};
use crate::error::{LlmError, Result};
use crate::query_plan::QueryPlan;

/// Queues a fixed sequence of responses and hands them out one call at a
/// time; used to exercise the chat processor and workers without a real
/// LLM SDK. A canned response list behind a mutex index, the same
/// pattern the reference system uses to stub out providers in its own
/// unit tests.
pub struct ScriptedLlmClient {
    name: String,
    responses: Mutex<std::collections::VecDeque<Result<RunOutcome>>>,
}

impl ScriptedLlmClient {
    pub fn new(name: impl Into<String>, responses: Vec<Result<RunOutcome>>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    pub fn text(session_id: impl Into<String>, response: impl Into<String>) -> RunOutcome {
        RunOutcome {
            response: response.into(),
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _plan: QueryPlan) -> Result<RunOutcome> {
        let mut queue = self.responses.lock().await;
        queue
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Transport("scripted responses exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_plan::InvocationPolicy;
    use std::time::Duration;

    #[tokio::test]
    async fn hands_out_responses_in_order() {
        let client = ScriptedLlmClient::new(
            "scripted",
            vec![
                Ok(ScriptedLlmClient::text("s1", "first")),
                Ok(ScriptedLlmClient::text("s1", "second")),
            ],
        );
        let plan = QueryPlan::new("hi", InvocationPolicy::new(Duration::from_secs(5)));
        let first = client.run(plan.clone()).await.unwrap();
        assert_eq!(first.response, "first");
        let second = client.run(plan).await.unwrap();
        assert_eq!(second.response, "second");
    }
}
