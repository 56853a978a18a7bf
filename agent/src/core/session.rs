//! Per-request orchestration state.
//!
//! An [`AgentSession`] owns the append-only transcript, the step counter and
//! the termination state. It performs no I/O; the loop in [`crate::agent`]
//! drives it.

use serde::Serialize;

/// Fixed user-visible string returned when the step budget runs out.
pub const EXHAUSTED_MESSAGE: &str = "[Agent error] max steps reached or failed to finish.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
    Runner,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Model => "Assistant",
            Speaker::Runner => "Runner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    Running,
    Done,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct AgentSession {
    transcript: Vec<Turn>,
    steps: u32,
    max_steps: u32,
    termination: Termination,
}

impl AgentSession {
    /// Start a session for `request` with a fixed step budget.
    pub fn new(request: &str, max_steps: u32) -> Self {
        Self {
            transcript: vec![Turn {
                speaker: Speaker::User,
                text: request.to_string(),
            }],
            steps: 0,
            max_steps,
            termination: Termination::Running,
        }
    }

    /// Claim the next step. Returns `false` (and moves to `Exhausted`) when the
    /// budget is spent; the counter never exceeds `max_steps`.
    pub fn begin_step(&mut self) -> bool {
        if self.termination != Termination::Running {
            return false;
        }
        if self.steps >= self.max_steps {
            self.termination = Termination::Exhausted;
            return false;
        }
        self.steps += 1;
        true
    }

    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(Turn {
            speaker,
            text: text.into(),
        });
    }

    pub fn finish(&mut self) {
        self.termination = Termination::Done;
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// The original request (always the first turn).
    pub fn request(&self) -> &str {
        &self.transcript[0].text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counter_stops_at_budget() {
        let mut session = AgentSession::new("hi", 2);
        assert!(session.begin_step());
        assert!(session.begin_step());
        assert!(!session.begin_step());
        assert_eq!(session.steps(), 2);
        assert_eq!(session.termination(), &Termination::Exhausted);
        assert!(!session.begin_step());
        assert_eq!(session.steps(), 2);
    }

    #[test]
    fn zero_budget_exhausts_immediately() {
        let mut session = AgentSession::new("hi", 0);
        assert!(!session.begin_step());
        assert_eq!(session.termination(), &Termination::Exhausted);
    }

    #[test]
    fn finished_session_takes_no_more_steps() {
        let mut session = AgentSession::new("hi", 5);
        assert!(session.begin_step());
        session.finish();
        assert!(!session.begin_step());
        assert_eq!(session.termination(), &Termination::Done);
    }

    #[test]
    fn transcript_is_append_only_and_starts_with_request() {
        let mut session = AgentSession::new("find prices", 3);
        session.record(Speaker::Model, "reply");
        session.record(Speaker::Runner, "tool result");
        assert_eq!(session.request(), "find prices");
        let speakers: Vec<Speaker> = session.transcript().iter().map(|t| t.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Model, Speaker::Runner]
        );
    }
}
