//! Test-only fakes: scripted model replies, scripted strategies and fake
//! model scripts.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::strategy::{InvocationStrategy, default_strategies};
use crate::core::stream::ChunkShapes;
use crate::core::types::InvocationOutcome;
use crate::io::config::AgentConfig;
use crate::io::facade::Responder;
use crate::io::strategy::{ExecSettings, Strategy};

/// Fast-polling settings for process tests.
pub fn exec_settings() -> ExecSettings {
    ExecSettings {
        poll_interval: Duration::from_millis(5),
        output_limit_bytes: 64 * 1024,
        shapes: ChunkShapes::default(),
    }
}

/// Responder that replays canned replies and records every prompt.
///
/// Once the queue is drained the last reply repeats. Clones share state, so a
/// clone handed to a tool still reports its prompts here.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponder {
    inner: Rc<RefCell<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<String>,
    last: String,
    prompts: Vec<String>,
}

impl ScriptedResponder {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Rc::new(RefCell::new(ScriptState {
                replies: replies.into_iter().map(Into::into).collect(),
                ..ScriptState::default()
            })),
        }
    }

    /// Every prompt seen so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.inner.borrow().prompts.clone()
    }

    pub fn calls(&self) -> usize {
        self.inner.borrow().prompts.len()
    }
}

impl Responder for ScriptedResponder {
    fn respond(&self, prompt: &str) -> String {
        let mut state = self.inner.borrow_mut();
        state.prompts.push(prompt.to_string());
        if let Some(next) = state.replies.pop_front() {
            state.last = next;
        }
        state.last.clone()
    }
}

enum Script {
    Outcome(InvocationOutcome),
    Fault(String),
}

/// Strategy that returns a fixed outcome (or fault) without spawning anything.
pub struct ScriptedStrategy {
    name: String,
    script: Script,
}

impl ScriptedStrategy {
    pub fn outcome(name: &str, outcome: InvocationOutcome) -> Self {
        Self {
            name: name.to_string(),
            script: Script::Outcome(outcome),
        }
    }

    pub fn fault(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Script::Fault(message.to_string()),
        }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _prompt: &str, _timeout: Duration) -> Result<InvocationOutcome> {
        match &self.script {
            Script::Outcome(outcome) => Ok(outcome.clone()),
            Script::Fault(message) => Err(anyhow!("{message}")),
        }
    }
}

pub fn scripted(strategies: Vec<ScriptedStrategy>) -> Vec<Box<dyn Strategy>> {
    strategies
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn Strategy>)
        .collect()
}

/// Write a shell script standing in for the model CLI.
///
/// It is run as `sh <script> <args..>`, so it needs no exec bit.
pub fn write_fake_model(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ollama.sh");
    fs::write(&path, format!("{body}\n")).expect("write fake model script");
    path
}

/// Default strategy chain rewritten to run through the fake model script.
pub fn fake_chain(script: &Path) -> Vec<InvocationStrategy> {
    default_strategies()
        .into_iter()
        .map(|mut strategy| {
            strategy.args.insert(0, script.display().to_string());
            strategy
        })
        .collect()
}

/// Config whose model executable is `sh` running `script`.
pub fn fake_config(script: &Path, timeout_secs: u64) -> AgentConfig {
    let mut cfg = AgentConfig::default();
    cfg.model.executable = "sh".to_string();
    cfg.model.candidate_paths = Vec::new();
    cfg.model.timeout_secs = timeout_secs;
    cfg.model.poll_interval_ms = 5;
    cfg.strategies = fake_chain(script);
    cfg
}
