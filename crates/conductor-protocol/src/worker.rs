use serde_json::Value;
use tracing::debug;

use crate::extract::{extract_json_object, strip_span};

/// A worker-context response directive. Unlike the chat-context
/// variants, these three are exhaustive and exclusive: every worker
/// invocation resolves to exactly one.
#[derive(Debug, Clone)]
pub enum WorkerDirective {
    NeedsInput { question: Value },
    Complete,
    Continue,
}

#[derive(Debug, Clone)]
pub struct WorkerClassification {
    pub directive: WorkerDirective,
    pub state_update: Option<Value>,
    pub next_step: Option<String>,
    pub message: String,
}

/// Classifies a raw LLM response in worker context. Unrecognised JSON (or
/// no JSON at all) classifies as `Continue` with no state update — the
/// worker treats an unparseable cycle as "nothing to do yet" rather than
/// an error.
pub fn classify_worker(response: &str) -> WorkerClassification {
    let Some((value, span)) = extract_json_object(response) else {
        debug!("no JSON object in worker response, treating cycle as continue");
        return WorkerClassification {
            directive: WorkerDirective::Continue,
            state_update: None,
            next_step: None,
            message: response.trim().to_string(),
        };
    };

    let Some(obj) = value.as_object() else {
        debug!("worker response JSON was not an object, treating cycle as continue");
        return WorkerClassification {
            directive: WorkerDirective::Continue,
            state_update: None,
            next_step: None,
            message: response.trim().to_string(),
        };
    };

    let directive = if matches!(obj.get("needs_input"), Some(Value::Bool(true))) {
        WorkerDirective::NeedsInput {
            question: obj.get("question").cloned().unwrap_or(Value::Null),
        }
    } else if matches!(obj.get("complete"), Some(Value::Bool(true))) {
        WorkerDirective::Complete
    } else {
        WorkerDirective::Continue
    };

    let state_update = obj
        .get("state_update")
        .filter(|v| v.is_object())
        .cloned();

    let next_step = obj
        .get("next_step")
        .and_then(Value::as_str)
        .map(str::to_string);

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let stripped = strip_span(response, &span);
            if stripped.is_empty() {
                response.trim().to_string()
            } else {
                stripped
            }
        });

    WorkerClassification {
        directive,
        state_update,
        next_step,
        message,
    }
}
