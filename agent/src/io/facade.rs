//! Response façade: the single string-in, string-out entry point to the model.
//!
//! Callers never see an error. A failed invocation comes back as a multi-line
//! diagnostic that starts with [`DIAGNOSTIC_PREFIX`], so a degraded answer can
//! be told apart from a real one with [`is_degraded`].

use std::time::Duration;

use tracing::{instrument, warn};

use crate::core::text::{collapse_whitespace, truncate_chars};
use crate::core::types::InvocationOutcome;
use crate::io::config::AgentConfig;
use crate::io::coordinator::Coordinator;

/// Stable first line of every diagnostic reply.
pub const DIAGNOSTIC_PREFIX: &str = "LLM (Ollama) unavailable or returned error.";

/// Anything that turns a prompt into a reply string.
pub trait Responder {
    fn respond(&self, prompt: &str) -> String;
}

impl<F> Responder for F
where
    F: Fn(&str) -> String,
{
    fn respond(&self, prompt: &str) -> String {
        self(prompt)
    }
}

/// True when `reply` is a façade diagnostic rather than model output.
pub fn is_degraded(reply: &str) -> bool {
    reply.starts_with(DIAGNOSTIC_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticLimits {
    pub excerpt_chars: usize,
    pub prompt_echo_chars: usize,
}

#[derive(Debug, Clone)]
pub struct ResponseFacade {
    coordinator: Coordinator,
    model: String,
    timeout: Duration,
    limits: DiagnosticLimits,
}

impl ResponseFacade {
    pub fn new(
        coordinator: Coordinator,
        model: &str,
        timeout: Duration,
        limits: DiagnosticLimits,
    ) -> Self {
        Self {
            coordinator,
            model: model.to_string(),
            timeout,
            limits,
        }
    }

    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self::new(
            cfg.coordinator(),
            &cfg.model.name,
            cfg.timeout(),
            DiagnosticLimits {
                excerpt_chars: cfg.diagnostics.excerpt_chars,
                prompt_echo_chars: cfg.diagnostics.prompt_echo_chars,
            },
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Like [`Responder::respond`] but against a different model.
    #[instrument(skip_all, fields(model = model, prompt_chars = prompt.chars().count()))]
    pub fn respond_with_model(&self, prompt: &str, model: &str) -> String {
        let outcome = self.coordinator.invoke(prompt, model, self.timeout);
        render_reply(&outcome, prompt, model, self.limits)
    }
}

impl Responder for ResponseFacade {
    fn respond(&self, prompt: &str) -> String {
        self.respond_with_model(prompt, &self.model)
    }
}

/// Turn a coordinator outcome into the caller-facing string.
pub fn render_reply(
    outcome: &InvocationOutcome,
    prompt: &str,
    model: &str,
    limits: DiagnosticLimits,
) -> String {
    if outcome.is_success()
        && let Some(text) = &outcome.text
    {
        return collapse_whitespace(text);
    }
    warn!(status = outcome.status, strategy = %outcome.strategy, "returning diagnostic reply");

    let mut lines = vec![
        DIAGNOSTIC_PREFIX.to_string(),
        format!("Model: {model}"),
        format!("Return code: {}", outcome.status),
    ];
    if let Some(detail) = outcome.diagnostic.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push("STDERR:".to_string());
        lines.push(truncate_chars(detail, limits.excerpt_chars).to_string());
    }
    if let Some(partial) = outcome.text.as_deref().filter(|t| !t.is_empty()) {
        lines.push("STDOUT (partial):".to_string());
        lines.push(truncate_chars(partial, limits.excerpt_chars).to_string());
    }
    lines.push("Fallback: deterministic plan/summary used.".to_string());
    lines.push(format!(
        "Truncated prompt (first {} chars):",
        limits.prompt_echo_chars
    ));
    lines.push(format!(
        "{}...",
        truncate_chars(prompt, limits.prompt_echo_chars)
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::status;

    const LIMITS: DiagnosticLimits = DiagnosticLimits {
        excerpt_chars: 20,
        prompt_echo_chars: 5,
    };

    #[test]
    fn success_returns_normalized_text() {
        let outcome = InvocationOutcome::success("run", "a  b\nc".to_string());
        assert_eq!(render_reply(&outcome, "prompt", "m", LIMITS), "a b c");
    }

    #[test]
    fn failure_renders_bounded_diagnostic() {
        let outcome = InvocationOutcome::failure(
            "coordinator",
            status::ALL_FAILED,
            "x".repeat(100),
        );
        let reply = render_reply(&outcome, "a long prompt here", "llama3", LIMITS);
        assert!(is_degraded(&reply));
        assert!(reply.contains("Model: llama3"));
        assert!(reply.contains("Return code: -9"));
        assert!(reply.contains(&format!("\n{}\n", "x".repeat(20))));
        assert!(!reply.contains(&"x".repeat(21)));
        assert!(reply.contains("Fallback: deterministic plan/summary used."));
        assert!(reply.ends_with("a lon..."));
    }

    #[test]
    fn real_answers_are_not_degraded() {
        assert!(!is_degraded("The lowest quote is at City Hospital."));
    }
}
