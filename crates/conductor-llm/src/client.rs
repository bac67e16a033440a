use async_trait::async_trait;
use tokio_stream::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::query_plan::QueryPlan;
use crate::stream::StreamEvent;

/// The aggregated result of one `LlmClient::run` call.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub response: String,
    pub session_id: String,
}

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// The LLM client port. Grounded in the reference system's
/// `LlmProvider` trait: a `name()` for diagnostics, a single-shot call,
/// and a streaming call with a non-streaming fallback (one `Assistant`
/// event followed by `Done`) for implementations that don't support
/// incremental output.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, plan: QueryPlan) -> Result<RunOutcome>;

    async fn stream(&self, plan: QueryPlan) -> Result<EventStream> {
        let outcome = self.run(plan).await?;
        let events = vec![
            StreamEvent::Init {
                session_id: outcome.session_id.clone(),
            },
            StreamEvent::Assistant {
                content: outcome.response,
            },
            StreamEvent::Done,
        ];
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
