//! Shared deterministic types for invocation and orchestration.
//!
//! These types define stable contracts between the invocation layer and the
//! orchestration loop. They carry no I/O and behave identically across runs.

use serde::{Deserialize, Serialize};

/// Numeric status classes carried by [`InvocationOutcome::status`].
///
/// Zero is success, negative values are internal failure classes, and any
/// other value is the exit code reported by the external process.
pub mod status {
    pub const SUCCESS: i32 = 0;
    /// The model executable could not be located at all.
    pub const EXECUTABLE_NOT_FOUND: i32 = -1;
    /// The wall-clock deadline expired and the child was killed.
    pub const TIMEOUT: i32 = -2;
    /// The child process could not be spawned.
    pub const SPAWN_FAILED: i32 = -3;
    /// The child ended without an exit code (signal) or the runner faulted.
    pub const TERMINATED: i32 = -4;
    /// Every configured strategy was attempted and none succeeded.
    pub const ALL_FAILED: i32 = -9;
}

/// Normalized result of one invocation attempt.
///
/// Exactly one of `text` / `diagnostic` is populated. Text is only ever set
/// together with [`status::SUCCESS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub text: Option<String>,
    pub diagnostic: Option<String>,
    pub status: i32,
    pub strategy: String,
}

impl InvocationOutcome {
    pub fn success(strategy: &str, text: String) -> Self {
        Self {
            text: Some(text),
            diagnostic: None,
            status: status::SUCCESS,
            strategy: strategy.to_string(),
        }
    }

    pub fn failure(strategy: &str, status: i32, diagnostic: impl Into<String>) -> Self {
        Self {
            text: None,
            diagnostic: Some(diagnostic.into()),
            status,
            strategy: strategy.to_string(),
        }
    }

    pub fn timeout(strategy: &str) -> Self {
        Self::failure(strategy, status::TIMEOUT, "timeout")
    }

    /// Non-empty text paired with a zero status.
    pub fn is_success(&self) -> bool {
        self.status == status::SUCCESS && self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Diagnostic text, or a placeholder when a failure carried none.
    pub fn diagnostic_or_default(&self) -> &str {
        self.diagnostic.as_deref().unwrap_or("no diagnostic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_text_and_zero_status() {
        assert!(InvocationOutcome::success("run", "hi".to_string()).is_success());
        assert!(!InvocationOutcome::success("run", String::new()).is_success());
        assert!(!InvocationOutcome::failure("run", 0, "no output").is_success());
        assert!(!InvocationOutcome::timeout("run").is_success());
    }

    #[test]
    fn timeout_outcome_has_fixed_shape() {
        let outcome = InvocationOutcome::timeout("stream_json_chat");
        assert_eq!(outcome.status, status::TIMEOUT);
        assert_eq!(outcome.diagnostic.as_deref(), Some("timeout"));
        assert!(outcome.text.is_none());
    }
}
