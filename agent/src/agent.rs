//! Bounded tool-calling loop.
//!
//! Each step asks the model for exactly one action, acts on it, and feeds the
//! result (or a corrective instruction) into the next prompt. The loop ends
//! on `done` or when the step budget is spent; it never returns an error to
//! callers of [`run_agent_prompt`].

use anyhow::{Result, bail};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::core::action::{Action, ActionError, parse_action};
use crate::core::session::{AgentSession, EXHAUSTED_MESSAGE, Speaker, Termination, Turn};
use crate::io::config::AgentConfig;
use crate::io::facade::{Responder, ResponseFacade, is_degraded};
use crate::io::prompt::{PromptBuilder, PromptEngine};
use crate::tools::{ToolRegistry, default_registry};

/// Final state of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    /// The `done` result, or [`EXHAUSTED_MESSAGE`].
    pub answer: String,
    /// Model calls made.
    pub steps: u32,
    pub termination: Termination,
    pub transcript: Vec<Turn>,
}

impl AgentOutcome {
    fn from_session(session: AgentSession, answer: String) -> Self {
        Self {
            answer,
            steps: session.steps(),
            termination: session.termination().clone(),
            transcript: session.transcript().to_vec(),
        }
    }
}

enum StepResult {
    Finish(String),
    Continue(String),
}

pub struct Agent<'a, R> {
    responder: &'a R,
    registry: &'a ToolRegistry,
    prompts: PromptEngine,
    builder: PromptBuilder,
}

impl<'a, R: Responder> Agent<'a, R> {
    pub fn new(responder: &'a R, registry: &'a ToolRegistry, history_budget_chars: usize) -> Self {
        Self {
            responder,
            registry,
            prompts: PromptEngine::new(),
            builder: PromptBuilder::new(history_budget_chars),
        }
    }

    /// Run `request` for at most `max_steps` model calls.
    #[instrument(skip_all, fields(max_steps))]
    pub fn run(&self, request: &str, max_steps: u32) -> Result<AgentOutcome> {
        let system = self.prompts.system(&self.registry.listings())?;
        let mut session = AgentSession::new(request, max_steps);

        while session.begin_step() {
            let prompt = self.builder.build(&system, &session);
            debug!(step = session.steps(), prompt_chars = prompt.len(), "calling model");
            let reply = self.responder.respond(&prompt);
            session.record(Speaker::Model, reply.as_str());

            match self.interpret(&reply)? {
                StepResult::Finish(result) => {
                    session.finish();
                    info!(steps = session.steps(), "agent finished");
                    return Ok(AgentOutcome::from_session(session, result));
                }
                StepResult::Continue(feedback) => session.record(Speaker::Runner, feedback),
            }
        }

        warn!(steps = session.steps(), "step budget exhausted");
        Ok(AgentOutcome::from_session(
            session,
            EXHAUSTED_MESSAGE.to_string(),
        ))
    }

    fn interpret(&self, reply: &str) -> Result<StepResult> {
        if is_degraded(reply) {
            warn!("model unavailable this step");
            return Ok(StepResult::Continue(self.prompts.degraded()?));
        }
        let action = match parse_action(reply) {
            Ok(action) => action,
            Err(ActionError::NoAction) => {
                debug!("reply carried no action");
                return Ok(StepResult::Continue(self.prompts.no_action(reply)?));
            }
            Err(ActionError::Unparsable { reason }) => {
                debug!(reason = %reason, "reply action did not parse");
                return Ok(StepResult::Continue(
                    self.prompts.unparsable(reply, &reason)?,
                ));
            }
        };

        match action {
            Action::Done { result } => Ok(StepResult::Finish(result)),
            Action::CallTool { tool, args } => match self.registry.dispatch(&tool, &args) {
                Some(result) => {
                    info!(tool = %tool, ok = result.is_success(), "tool call");
                    Ok(StepResult::Continue(
                        self.prompts.tool_result(&tool, &result.to_prompt_json())?,
                    ))
                }
                None => {
                    warn!(tool = %tool, "unknown tool requested");
                    let error = json!({ "error": format!("Unknown tool: {tool}") }).to_string();
                    Ok(StepResult::Continue(
                        self.prompts.unknown_tool(&error, &self.registry.names())?,
                    ))
                }
            },
            Action::Unrecognized { raw, .. } => {
                debug!(payload = %raw, "unrecognized action");
                Ok(StepResult::Continue(self.prompts.unrecognized(&raw)?))
            }
        }
    }
}

/// Run the agent against the configured model with the built-in tools.
///
/// `max_steps` defaults to `agent.max_steps`.
pub fn run_with_config(
    cfg: &AgentConfig,
    request: &str,
    max_steps: Option<u32>,
) -> Result<AgentOutcome> {
    let max_steps = max_steps.unwrap_or(cfg.agent.max_steps);
    if max_steps == 0 {
        bail!("max_steps must be > 0");
    }
    let facade = ResponseFacade::from_config(cfg);
    let registry = default_registry(&cfg.tools, facade.clone())?;
    Agent::new(&facade, &registry, cfg.agent.history_budget_chars).run(request, max_steps)
}

/// Caller-facing entry point: always returns a string.
pub fn run_agent_prompt(cfg: &AgentConfig, request: &str, max_steps: Option<u32>) -> String {
    match run_with_config(cfg, request, max_steps) {
        Ok(outcome) => outcome.answer,
        Err(err) => {
            error!(err = %format!("{err:#}"), "agent run failed");
            EXHAUSTED_MESSAGE.to_string()
        }
    }
}
