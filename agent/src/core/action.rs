//! Extraction of a single structured action from free-form model text.
//!
//! Parsing is two-stage: locate the span from the first `{` to the last `}`,
//! then strictly decode only that span. The span is never repaired.

use serde_json::{Map, Value};
use thiserror::Error;

pub const ACTION_KEY: &str = "action";
pub const CALL_TOOL: &str = "call_tool";
pub const DONE: &str = "done";
pub const MISSING_RESULT: &str = "(no result provided)";

/// Action requested by the model in one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run a registered tool. `tool` is never empty.
    CallTool { tool: String, args: Value },
    /// Finish the session with `result`.
    Done { result: String },
    /// Decoded object with a missing or unknown discriminator. `raw` is the
    /// span exactly as the model wrote it.
    Unrecognized {
        payload: Map<String, Value>,
        raw: String,
    },
}

/// Recoverable reasons a response carried no usable action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("no action found")]
    NoAction,
    #[error("unparsable action: {reason}")]
    Unparsable { reason: String },
}

/// Extract zero or one action from `response`.
pub fn parse_action(response: &str) -> Result<Action, ActionError> {
    let span = action_span(response).ok_or(ActionError::NoAction)?;
    let payload: Map<String, Value> =
        serde_json::from_str(span).map_err(|err| ActionError::Unparsable {
            reason: err.to_string(),
        })?;
    Ok(classify(payload, span))
}

/// Outermost `{ ... }` span, if both braces exist in order.
pub fn action_span(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&response[start..=end])
}

fn classify(payload: Map<String, Value>, span: &str) -> Action {
    let unrecognized = |payload| Action::Unrecognized {
        payload,
        raw: span.to_string(),
    };
    match payload.get(ACTION_KEY).and_then(Value::as_str) {
        Some(CALL_TOOL) => {
            let tool = payload
                .get("tool")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            match tool {
                Some(tool) => {
                    let args = match payload.get("args") {
                        None | Some(Value::Null) => Value::Object(Map::new()),
                        Some(args) => args.clone(),
                    };
                    Action::CallTool { tool, args }
                }
                None => unrecognized(payload),
            }
        }
        Some(DONE) => {
            let result = match payload.get("result") {
                Some(Value::String(text)) => text.clone(),
                None | Some(Value::Null) => MISSING_RESULT.to_string(),
                Some(other) => other.to_string(),
            };
            Action::Done { result }
        }
        _ => unrecognized(payload),
    }
}
