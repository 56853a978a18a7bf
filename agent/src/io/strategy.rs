//! Strategy executor: one external process per invocation attempt.
//!
//! The [`Strategy`] trait decouples the coordinator from how a model process
//! is actually driven. [`ProcessStrategy`] spawns the configured command;
//! tests use scripted strategies that never spawn anything.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument, warn};

use crate::core::budget::{drain_deadline, next_poll_wait};
use crate::core::strategy::{InvocationStrategy, OutputEncoding};
use crate::core::stream::{ChunkShapes, StreamAccumulator};
use crate::core::text::collapse_whitespace;
use crate::core::types::{InvocationOutcome, status};
use crate::io::process::{
    DRAIN_GRACE, collect_with_timeout, drain_until, feed_stdin, kill_and_reap, spawn_chunk_reader,
    spawn_line_reader, spawn_piped, wait_until,
};

/// How long a child may linger after signalling completion before it is killed.
const COMPLETION_GRACE: Duration = Duration::from_secs(1);

/// One way of obtaining a model response.
pub trait Strategy {
    fn name(&self) -> &str;

    /// Produce exactly one outcome within `timeout`.
    ///
    /// `Err` is reserved for unexpected runner faults; expected failures
    /// (spawn errors, timeouts, bad exits) are failure outcomes.
    fn invoke(&self, prompt: &str, timeout: Duration) -> Result<InvocationOutcome>;
}

/// Settings shared by every process-backed strategy.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    pub poll_interval: Duration,
    pub output_limit_bytes: usize,
    pub shapes: ChunkShapes,
}

/// Strategy that runs the model executable with a configured argument template.
#[derive(Debug, Clone)]
pub struct ProcessStrategy {
    strategy: InvocationStrategy,
    program: PathBuf,
    model: String,
    settings: ExecSettings,
}

impl ProcessStrategy {
    pub fn new(
        strategy: InvocationStrategy,
        program: PathBuf,
        model: &str,
        settings: ExecSettings,
    ) -> Self {
        Self {
            strategy,
            program,
            model: model.to_string(),
            settings,
        }
    }

    fn invoke_blob(&self, child: Child, input: &[u8], timeout: Duration) -> Result<InvocationOutcome> {
        let output = collect_with_timeout(child, input, timeout, self.settings.output_limit_bytes)
            .with_context(|| format!("run {}", self.strategy.name))?;
        if output.timed_out {
            return Ok(InvocationOutcome::timeout(&self.strategy.name));
        }
        let text = collapse_whitespace(&output.stdout_lossy());
        Ok(finish(
            &self.strategy.name,
            exit_code(output.status),
            text,
            &output.stderr_lossy(),
        ))
    }

    fn invoke_streaming(
        &self,
        mut child: Child,
        input: &[u8],
        timeout: Duration,
    ) -> Result<InvocationOutcome> {
        let name = self.strategy.name.as_str();
        let deadline = Instant::now() + timeout;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        let lines = spawn_line_reader(stdout);
        let stderr_rx = spawn_chunk_reader(stderr);

        if let Err(err) = feed_stdin(child.stdin.take(), input.to_vec()) {
            kill_and_reap(&mut child);
            return Err(err);
        }

        let mut acc = StreamAccumulator::default();
        let mut completed = false;
        loop {
            let Some(wait) = next_poll_wait(deadline, self.settings.poll_interval) else {
                return Ok(expire(name, &mut child, timeout));
            };
            match lines.recv_timeout(wait) {
                Ok(Ok(line)) => {
                    let decoded = self.settings.shapes.decode_line(&line);
                    if let Some(fragment) = decoded.fragment {
                        acc.push(fragment);
                    }
                    if decoded.done {
                        completed = true;
                        break;
                    }
                }
                Ok(Err(err)) => {
                    kill_and_reap(&mut child);
                    return Err(err).context("read stream line");
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(
            chunks = acc.chunks(),
            raw_lines = acc.raw_lines(),
            completed,
            "stream read finished"
        );

        let reap_deadline = if completed {
            deadline.min(Instant::now() + COMPLETION_GRACE)
        } else {
            deadline
        };
        let waited = match wait_until(&mut child, reap_deadline) {
            Ok(waited) => waited,
            Err(err) => {
                kill_and_reap(&mut child);
                return Err(err);
            }
        };
        let code = match waited {
            Some(exit) => exit_code(exit),
            None if completed => {
                debug!("child still running after completion flag, stopping it");
                kill_and_reap(&mut child);
                status::SUCCESS
            }
            None => return Ok(expire(name, &mut child, timeout)),
        };

        // After a completion flag stderr no longer affects the outcome.
        let drain_by = if completed {
            Instant::now() + DRAIN_GRACE
        } else {
            drain_deadline(deadline, DRAIN_GRACE)
        };
        let stderr = drain_until(&stderr_rx, drain_by, self.settings.output_limit_bytes)
            .context("read stderr")?;
        if !stderr.complete {
            debug!("stderr still held open by a descendant, keeping what was read");
        }
        Ok(finish(
            name,
            code,
            collapse_whitespace(&acc.into_string()),
            &stderr.lossy(),
        ))
    }
}

impl Strategy for ProcessStrategy {
    fn name(&self) -> &str {
        &self.strategy.name
    }

    #[instrument(skip_all, fields(strategy = %self.strategy.name, timeout_ms = timeout.as_millis() as u64))]
    fn invoke(&self, prompt: &str, timeout: Duration) -> Result<InvocationOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.strategy.render_args(&self.model));
        let child = match spawn_piped(cmd) {
            Ok(child) => child,
            Err(err) => {
                error!(err = %err, program = %self.program.display(), "failed to spawn model process");
                return Ok(InvocationOutcome::failure(
                    &self.strategy.name,
                    status::SPAWN_FAILED,
                    format!("starting {} failed: {err}", self.strategy.name),
                ));
            }
        };
        info!(model = %self.model, "model process started");

        let input = self.strategy.encode_input(prompt);
        match self.strategy.output {
            OutputEncoding::JsonLines => self.invoke_streaming(child, input.as_bytes(), timeout),
            OutputEncoding::Blob => self.invoke_blob(child, input.as_bytes(), timeout),
        }
    }
}

fn expire(name: &str, child: &mut Child, timeout: Duration) -> InvocationOutcome {
    warn!(
        strategy = name,
        timeout_ms = timeout.as_millis() as u64,
        "model process timed out, killing"
    );
    kill_and_reap(child);
    InvocationOutcome::timeout(name)
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(status::TERMINATED)
}

/// Build the terminal outcome from collapsed stdout text and raw stderr.
///
/// Text is only surfaced under a zero status; otherwise it is folded into the
/// diagnostic as a partial-stdout excerpt.
fn finish(name: &str, code: i32, text: String, stderr: &str) -> InvocationOutcome {
    if code == status::SUCCESS && !text.is_empty() {
        return InvocationOutcome::success(name, text);
    }
    let mut parts = Vec::new();
    if code != status::SUCCESS {
        parts.push(format!("{name} exited with status {code}"));
    }
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        parts.push(stderr.to_string());
    }
    if !text.is_empty() {
        parts.push(format!("partial stdout: {text}"));
    }
    if parts.is_empty() {
        parts.push(format!("no output from {name}"));
    }
    InvocationOutcome::failure(name, code, parts.join("\n"))
}
