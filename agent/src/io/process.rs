//! Helpers for running model processes with deadlines and bounded output.
//!
//! Stdin is fed and both output pipes are drained on helper threads, so the
//! caller only ever blocks on the child itself and always under a deadline.
//! A descendant that inherits a pipe and outlives the child can hold it open
//! indefinitely; collection gives up at the deadline and keeps what arrived.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::budget::{drain_deadline, remaining_budget};

/// How long output readers get to reach EOF once the child has exited or
/// been killed, when the invocation deadline leaves less than that.
pub const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Captured output of a child that ran to completion (or was killed).
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Bytes collected from one output pipe.
#[derive(Debug, Default)]
pub struct Drained {
    pub bytes: Vec<u8>,
    pub truncated: usize,
    /// `false` when the pipe was still open at the drain deadline.
    pub complete: bool,
}

impl Drained {
    fn keep(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        let kept = chunk.len().min(room);
        self.bytes.extend_from_slice(&chunk[..kept]);
        self.truncated += chunk.len() - kept;
    }

    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Spawn `cmd` with all three standard streams piped.
pub fn spawn_piped(mut cmd: Command) -> io::Result<Child> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(program = ?cmd.get_program(), "spawning child process");
    cmd.spawn()
}

/// Write `input` to the child's stdin on a helper thread, then close it.
///
/// The writer ends with a broken pipe once the child exits or is killed, so a
/// child that never reads a large prompt cannot stall the caller.
pub fn feed_stdin(stdin: Option<ChildStdin>, input: Vec<u8>) -> Result<()> {
    let mut stdin = stdin.ok_or_else(|| anyhow!("stdin was not piped"))?;
    thread::spawn(move || match stdin.write_all(&input).and_then(|()| stdin.flush()) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading the whole prompt");
        }
        Err(err) => warn!(err = %err, "writing the prompt to stdin failed"),
    });
    Ok(())
}

/// Feed `input`, then wait for the child under `timeout`, capturing output.
///
/// `output_limit_bytes` bounds what is kept of each stream; the rest is still
/// drained and counted.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn collect_with_timeout(
    mut child: Child,
    input: &[u8],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let deadline = Instant::now() + timeout;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_rx = spawn_chunk_reader(stdout);
    let stderr_rx = spawn_chunk_reader(stderr);

    if let Err(err) = feed_stdin(child.stdin.take(), input.to_vec()) {
        kill_and_reap(&mut child);
        return Err(err);
    }

    let mut timed_out = false;
    let status = match wait_until(&mut child, deadline)? {
        Some(status) => status,
        None => {
            warn!(timeout_ms = timeout.as_millis() as u64, "child timed out, killing");
            timed_out = true;
            child.kill().context("kill child")?;
            child.wait().context("wait child after kill")?
        }
    };

    let drain_by = drain_deadline(deadline, DRAIN_GRACE);
    let stdout = drain_until(&stdout_rx, drain_by, output_limit_bytes).context("read stdout")?;
    let stderr = drain_until(&stderr_rx, drain_by, output_limit_bytes).context("read stderr")?;
    if !stdout.complete || !stderr.complete {
        warn!("output pipes still open after the child finished, keeping what was read");
    }
    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(CommandOutput {
        status,
        stdout: stdout.bytes,
        stderr: stderr.bytes,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        timed_out,
    })
}

/// Forward each stdout line over a channel; the channel disconnects at EOF.
pub fn spawn_line_reader<R: Read + Send + 'static>(reader: R) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Forward raw chunks of a stream over a channel; the channel disconnects at
/// EOF or once the receiver is dropped.
pub fn spawn_chunk_reader<R: Read + Send + 'static>(
    mut reader: R,
) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            let sent = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => tx.send(Ok(chunk[..n].to_vec())),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let _ = tx.send(Err(err));
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        }
    });
    rx
}

/// Collect chunks until the reader disconnects or `deadline` passes, keeping
/// at most `limit` bytes.
pub fn drain_until(
    chunks: &Receiver<io::Result<Vec<u8>>>,
    deadline: Instant,
    limit: usize,
) -> Result<Drained> {
    let mut drained = Drained::default();
    loop {
        let wait = remaining_budget(deadline).unwrap_or(Duration::ZERO);
        match chunks.recv_timeout(wait) {
            Ok(Ok(chunk)) => drained.keep(&chunk, limit),
            Ok(Err(err)) => return Err(err).context("read output"),
            Err(RecvTimeoutError::Timeout) => return Ok(drained),
            Err(RecvTimeoutError::Disconnected) => {
                drained.complete = true;
                return Ok(drained);
            }
        }
    }
}

/// Wait for the child until `deadline`. `None` means it is still running.
pub fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
    match remaining_budget(deadline) {
        Some(left) => child.wait_timeout(left).context("wait for child"),
        None => child.try_wait().context("poll child"),
    }
}

/// Best-effort kill plus reap; used on paths that already have an outcome.
pub fn kill_and_reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill failed (child likely exited)");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "failed to reap child");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn drain_counts_dropped_bytes() {
        let rx = spawn_chunk_reader(io::Cursor::new(vec![b'x'; 100]));
        let drained = drain_until(&rx, Instant::now() + Duration::from_secs(5), 40).expect("drain");
        assert_eq!(drained.bytes.len(), 40);
        assert_eq!(drained.truncated, 60);
        assert!(drained.complete);
    }

    #[test]
    fn drain_keeps_partial_output_when_writer_lingers() {
        let (tx, rx) = mpsc::channel();
        tx.send(Ok(b"partial".to_vec())).expect("send");
        let started = Instant::now();
        let drained =
            drain_until(&rx, Instant::now() + Duration::from_millis(50), 1024).expect("drain");
        assert_eq!(drained.lossy(), "partial");
        assert!(!drained.complete);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(tx);
    }

    #[test]
    fn line_reader_disconnects_at_eof() {
        let rx = spawn_line_reader(io::Cursor::new(b"a\nb\n".to_vec()));
        let lines: Vec<String> = rx.iter().map(|line| line.expect("line")).collect();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[test]
    fn collect_kills_hung_child() {
        let child = spawn_piped(sh("exec sleep 5")).expect("spawn sh");
        let started = Instant::now();
        let output =
            collect_with_timeout(child, b"", Duration::from_millis(200), 1024).expect("collect");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn collect_captures_stdout_and_stderr() {
        let child = spawn_piped(sh("cat; echo oops >&2; exit 3")).expect("spawn sh");
        let output =
            collect_with_timeout(child, b"ping\n", Duration::from_secs(5), 1024).expect("collect");
        assert!(!output.timed_out);
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout_lossy(), "ping\n");
        assert_eq!(output.stderr_lossy().trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn collect_is_bounded_when_a_grandchild_holds_the_pipes() {
        let child = spawn_piped(sh("cat >/dev/null; sleep 6; true")).expect("spawn sh");
        let started = Instant::now();
        let output =
            collect_with_timeout(child, b"hi", Duration::from_millis(300), 1024).expect("collect");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn collect_keeps_output_of_child_with_background_job() {
        let child = spawn_piped(sh("echo hi; sleep 6 &")).expect("spawn sh");
        let started = Instant::now();
        let output =
            collect_with_timeout(child, b"", Duration::from_millis(500), 1024).expect("collect");
        assert!(!output.timed_out);
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(output.stdout_lossy(), "hi\n");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn collect_times_out_while_a_large_input_is_unread() {
        let child = spawn_piped(sh("exec sleep 6")).expect("spawn sh");
        let input = vec![b'x'; 300_000];
        let started = Instant::now();
        let output =
            collect_with_timeout(child, &input, Duration::from_millis(300), 1024).expect("collect");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
