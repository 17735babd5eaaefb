//! Process spawning, waiting, and output capture via tokio.
//!
//! This module handles transient execution: run a command under the system
//! shell, drain stdout and stderr concurrently, and hand back both streams
//! with the exit code. The background-record path in [`crate::registry`]
//! reuses the same spawn and drain plumbing.

use serde::Serialize;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::command;

/// Maximum bytes captured per stream. Prevents OOM from commands that
/// produce unbounded output (e.g. `yes`, `cat /dev/urandom`). Past the cap
/// the pipe is still drained so the child doesn't block, but the data is
/// discarded.
const MAX_CAPTURE_BYTES: usize = 8 * 1024 * 1024;

/// Chunk size for pipe reads.
const READ_CHUNK: usize = 1024;

/// A shared byte buffer a reader task appends to while the caller can
/// snapshot it concurrently.
pub type StreamBuffer = Arc<Mutex<Vec<u8>>>;

/// Create a new shared stream buffer.
#[must_use]
pub fn new_buffer() -> StreamBuffer {
    Arc::new(Mutex::new(Vec::new()))
}

/// Result of a completed transient execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    /// The shape every failure takes: empty stdout, the message as stderr,
    /// exit code -1.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: -1,
        }
    }
}

/// Spawn a command under `/bin/sh -c` with piped output streams.
///
/// The `ls` color rule is applied here so both the transient and the
/// background path see the normalized command. stdin is only piped when a
/// payload will be written; otherwise the child inherits the terminal.
pub(crate) fn spawn_shell(command_line: &str, stdin_payload: &str) -> std::io::Result<Child> {
    let normalized = command::force_ls_color(command_line);
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(&normalized);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if !stdin_payload.is_empty() {
        cmd.stdin(Stdio::piped());
    }
    cmd.spawn()
}

/// Write the stdin payload to the child and close its input.
///
/// Runs detached: the pipe is closed as soon as the payload is flushed, so
/// line-reading children see EOF instead of hanging.
pub(crate) fn feed_stdin(child: &mut Child, payload: &str) {
    if payload.is_empty() {
        return;
    }
    if let Some(mut stdin) = child.stdin.take() {
        let payload = payload.to_string();
        tokio::spawn(async move {
            let _ = stdin.write_all(payload.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
    }
}

/// Drain a child stream into a shared buffer until EOF.
///
/// When `echo` is set, chunks are also written to the local terminal as
/// they arrive -- the local shell streams one-shot output live, and remote
/// `/run` commands show their output on the human's screen.
pub(crate) fn drain_stream<R>(mut reader: R, buffer: StreamBuffer, echo: bool) -> JoinHandle<()>
where
    R: AsyncReadExt + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if echo {
                        let mut out = tokio::io::stdout();
                        let _ = out.write_all(&chunk[..n]).await;
                        let _ = out.flush().await;
                    }
                    let mut buf = buffer.lock().await;
                    if buf.len() < MAX_CAPTURE_BYTES {
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

/// Execute a command and wait for it to complete, capturing both streams.
///
/// Never errors to the caller: spawn failure returns empty stdout, the
/// error text as stderr, and exit code -1. Commands that require a
/// controlling terminal are refused with a hint at the interactive
/// endpoints rather than spawned against a pipe.
pub async fn run(command_line: &str, stdin_payload: &str, echo: bool) -> ExecResult {
    if command::is_interactive(command_line) {
        return ExecResult::failure(command::INTERACTIVE_HINT_RUN);
    }

    let mut child = match spawn_shell(command_line, stdin_payload) {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(command = %command_line, error = %e, "spawn failed");
            return ExecResult::failure(format!("Failed to spawn process: {e}"));
        }
    };

    feed_stdin(&mut child, stdin_payload);

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let stdout_buf = new_buffer();
    let stderr_buf = new_buffer();
    let stdout_task = drain_stream(stdout, stdout_buf.clone(), echo);
    let stderr_task = drain_stream(stderr, stderr_buf.clone(), echo);

    let exit_code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(_) => -1,
    };

    // Wait for both pipes to hit EOF so the buffers are complete.
    let _ = stdout_task.await;
    let _ = stderr_task.await;

    let stdout = String::from_utf8_lossy(&stdout_buf.lock().await).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_buf.lock().await).into_owned();

    ExecResult {
        stdout,
        stderr,
        exit_code,
    }
}
