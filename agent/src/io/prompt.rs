//! Prompt rendering for the agent loop.
//!
//! Static text lives in minijinja templates under `io/prompts/`. The full
//! prompt for a step is the system contract followed by the transcript; older
//! middle turns are dropped first when the history budget is exceeded.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::session::{AgentSession, Speaker, Turn};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const NO_ACTION_TEMPLATE: &str = include_str!("prompts/no_action.md");
const UNPARSABLE_TEMPLATE: &str = include_str!("prompts/unparsable.md");
const DEGRADED_TEMPLATE: &str = include_str!("prompts/degraded.md");
const TOOL_RESULT_TEMPLATE: &str = include_str!("prompts/tool_result.md");
const UNKNOWN_TOOL_TEMPLATE: &str = include_str!("prompts/unknown_tool.md");
const UNRECOGNIZED_TEMPLATE: &str = include_str!("prompts/unrecognized.md");

/// One tool as listed in the system contract.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    pub name: String,
    pub description: String,
    /// Compact description of accepted args, e.g. `{"city": string = "Bangalore"}`.
    pub args: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("system", SYSTEM_TEMPLATE),
            ("no_action", NO_ACTION_TEMPLATE),
            ("unparsable", UNPARSABLE_TEMPLATE),
            ("degraded", DEGRADED_TEMPLATE),
            ("tool_result", TOOL_RESULT_TEMPLATE),
            ("unknown_tool", UNKNOWN_TOOL_TEMPLATE),
            ("unrecognized", UNRECOGNIZED_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("bundled prompt templates should be valid");
        }
        Self { env }
    }

    pub fn system(&self, tools: &[ToolListing]) -> Result<String> {
        Ok(self.env.get_template("system")?.render(context! { tools => tools })?)
    }

    pub fn no_action(&self, reply: &str) -> Result<String> {
        Ok(self
            .env
            .get_template("no_action")?
            .render(context! { reply => reply.trim() })?)
    }

    pub fn unparsable(&self, reply: &str, reason: &str) -> Result<String> {
        Ok(self
            .env
            .get_template("unparsable")?
            .render(context! { reply => reply.trim(), reason => reason })?)
    }

    pub fn degraded(&self) -> Result<String> {
        Ok(self.env.get_template("degraded")?.render(context! {})?)
    }

    pub fn tool_result(&self, tool: &str, result: &str) -> Result<String> {
        Ok(self
            .env
            .get_template("tool_result")?
            .render(context! { tool => tool, result => result })?)
    }

    pub fn unknown_tool(&self, error: &str, tools: &[String]) -> Result<String> {
        Ok(self
            .env
            .get_template("unknown_tool")?
            .render(context! { error => error, tools => tools })?)
    }

    pub fn unrecognized(&self, payload: &str) -> Result<String> {
        Ok(self
            .env
            .get_template("unrecognized")?
            .render(context! { payload => payload })?)
    }
}

/// Builds the per-step prompt under a history budget.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    history_budget_chars: usize,
}

impl PromptBuilder {
    pub fn new(history_budget_chars: usize) -> Self {
        Self {
            history_budget_chars,
        }
    }

    /// System contract, the original request, as many recent middle turns as
    /// fit the budget, and the latest turn.
    pub fn build(&self, system: &str, session: &AgentSession) -> String {
        let turns = session.transcript();
        let mut out = String::new();
        out.push_str(system.trim_end());
        out.push_str("\n\n");

        let Some((first, rest)) = turns.split_first() else {
            return out;
        };
        push_turn(&mut out, first);
        let Some((last, middle)) = rest.split_last() else {
            out.push_str("Follow protocol exactly.\n");
            return out;
        };

        let mut used = 0usize;
        let mut kept = 0usize;
        for turn in middle.iter().rev() {
            let cost = turn.text.chars().count();
            if used + cost > self.history_budget_chars {
                break;
            }
            used += cost;
            kept += 1;
        }
        let dropped = middle.len() - kept;
        if dropped > 0 {
            debug!(dropped, kept, "history budget exceeded, dropping oldest turns");
            out.push_str(&format!("[{dropped} earlier turns omitted]\n\n"));
        }
        for turn in &middle[dropped..] {
            push_turn(&mut out, turn);
        }
        push_turn(&mut out, last);
        out
    }
}

fn push_turn(out: &mut String, turn: &Turn) {
    let label = turn.speaker.label();
    match turn.speaker {
        Speaker::User => out.push_str(&format!("{label}: {}\n\n", turn.text.trim())),
        Speaker::Model | Speaker::Runner => {
            out.push_str(&format!("{label}:\n{}\n\n", turn.text.trim()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<ToolListing> {
        vec![ToolListing {
            name: "price_compare".to_string(),
            description: "Compare hospital package prices.".to_string(),
            args: r#"{"procedure": string, "city": string = "Bangalore"}"#.to_string(),
        }]
    }

    #[test]
    fn system_lists_tools_and_protocol() {
        let system = PromptEngine::new().system(&listing()).expect("render");
        assert!(system.contains("- price_compare: Compare hospital package prices."));
        assert!(system.contains(r#"{"action":"call_tool","tool":"<tool_name>","args":{...}}"#));
        assert!(system.contains(r#"{"action":"done","result":"<final textual answer>"}"#));
    }

    #[test]
    fn corrective_messages_quote_their_input() {
        let engine = PromptEngine::new();
        assert!(
            engine
                .no_action("just prose")
                .expect("render")
                .contains("Previous output: just prose")
        );
        let unknown = engine
            .unknown_tool(
                r#"{"error":"Unknown tool: fly"}"#,
                &["a".to_string(), "b".to_string()],
            )
            .expect("render");
        assert!(unknown.contains("Unknown tool: fly"));
        assert!(unknown.contains("Available tools: a, b."));
    }

    #[test]
    fn first_prompt_has_request_and_instruction() {
        let session = AgentSession::new("find prices", 6);
        let prompt = PromptBuilder::new(100).build("SYSTEM", &session);
        assert!(prompt.starts_with("SYSTEM\n\nUser: find prices"));
        assert!(prompt.ends_with("Follow protocol exactly.\n"));
    }

    #[test]
    fn budget_drops_oldest_middle_turns() {
        let mut session = AgentSession::new("req", 6);
        session.record(Speaker::Model, "a".repeat(30));
        session.record(Speaker::Runner, "b".repeat(30));
        session.record(Speaker::Model, "c".repeat(30));
        session.record(Speaker::Runner, "latest");
        let prompt = PromptBuilder::new(65).build("S", &session);
        assert!(prompt.contains("[1 earlier turns omitted]"));
        assert!(!prompt.contains(&"a".repeat(30)));
        assert!(prompt.contains(&"b".repeat(30)));
        assert!(prompt.contains(&"c".repeat(30)));
        assert!(prompt.trim_end().ends_with("latest"));
        assert!(prompt.contains("User: req"));
    }
}
