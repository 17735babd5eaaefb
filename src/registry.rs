//! Process registry: background child records keyed by UUID.
//!
//! `start` spawns a command and returns immediately; the record's reader
//! tasks keep appending to the stdout/stderr buffers until EOF. Records are
//! retained after the child exits -- and after an explicit kill -- so output
//! stays queryable for the record's whole lifetime.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::command;
use crate::process::{self, StreamBuffer};

/// How long to wait for pipe drains to finish once the child has exited.
const READER_SETTLE: Duration = Duration::from_millis(250);

/// Internal entry for a tracked background process.
struct ProcessEntry {
    command: String,
    child: tokio::process::Child,
    stdout: StreamBuffer,
    stderr: StreamBuffer,
    /// Reader tasks, awaited once termination is observed so the buffers
    /// hold the complete streams before `running` flips.
    readers: Vec<tokio::task::JoinHandle<()>>,
    /// Cached the first time termination is observed, so `running` flips
    /// from true to false exactly once.
    exit_code: Option<i32>,
}

impl ProcessEntry {
    /// Record the exit code after letting both pipe drains hit EOF, so a
    /// snapshot taken once `running` is false holds the complete streams.
    ///
    /// The wait is bounded: a grandchild that inherited the pipes can hold
    /// them open past the child's exit, and that must not wedge the
    /// snapshot path. On timeout the drain task keeps running detached and
    /// the buffers simply finish filling later.
    async fn settle(&mut self, code: i32) {
        for mut handle in self.readers.drain(..) {
            let _ = tokio::time::timeout(READER_SETTLE, &mut handle).await;
        }
        self.exit_code = Some(code);
    }
}

/// Point-in-time view of a background process.
#[derive(Debug, Clone, Serialize)]
pub struct OutputSnapshot {
    pub stdout: String,
    pub stderr: String,
    pub running: bool,
    pub exit_code: Option<i32>,
}

/// Thread-safe registry of background processes.
#[derive(Clone)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<HashMap<String, ProcessEntry>>>,
}

impl ProcessRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a command in the background and return its record id.
    ///
    /// Two detached reader tasks drain the pipes into the record's buffers;
    /// they end on their own at EOF. Interactive commands are refused with
    /// the endpoint hint, spawn failures with the error text.
    pub async fn start(&self, command_line: &str, stdin_payload: &str) -> Result<String, String> {
        if command::is_interactive(command_line) {
            return Err(command::INTERACTIVE_HINT_START.to_string());
        }

        let mut child = process::spawn_shell(command_line, stdin_payload)
            .map_err(|e| format!("Failed to spawn process: {e}"))?;
        process::feed_stdin(&mut child, stdin_payload);

        let stdout_pipe = child.stdout.take().expect("stdout was piped");
        let stderr_pipe = child.stderr.take().expect("stderr was piped");

        let stdout = process::new_buffer();
        let stderr = process::new_buffer();
        let readers = vec![
            process::drain_stream(stdout_pipe, stdout.clone(), false),
            process::drain_stream(stderr_pipe, stderr.clone(), false),
        ];

        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(id = %id, command = %command_line, "background process started");

        let entry = ProcessEntry {
            command: command_line.to_string(),
            child,
            stdout,
            stderr,
            readers,
            exit_code: None,
        };
        self.entries.lock().await.insert(id.clone(), entry);
        Ok(id)
    }

    /// Snapshot a record's buffers and termination state.
    ///
    /// Returns `None` for unknown ids. The snapshot concatenates everything
    /// captured so far; a record that has exited keeps answering with its
    /// final buffers.
    pub async fn output(&self, id: &str) -> Option<OutputSnapshot> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(id)?;

        if entry.exit_code.is_none() {
            if let Ok(Some(status)) = entry.child.try_wait() {
                entry.settle(status.code().unwrap_or(-1)).await;
            }
        }

        let stdout = String::from_utf8_lossy(&entry.stdout.lock().await).into_owned();
        let stderr = String::from_utf8_lossy(&entry.stderr.lock().await).into_owned();
        Some(OutputSnapshot {
            stdout,
            stderr,
            running: entry.exit_code.is_none(),
            exit_code: entry.exit_code,
        })
    }

    /// Terminate a background process and wait for it to exit.
    ///
    /// Sends SIGTERM to the child and awaits termination; the record stays
    /// in the registry so its final output remains queryable. Returns the
    /// exit code (-1 when the child died on the signal), or `None` for
    /// unknown ids.
    pub async fn kill(&self, id: &str) -> Option<i32> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(id)?;

        if entry.exit_code.is_none() {
            if let Some(pid) = entry.child.id() {
                let _ = nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid as i32),
                    nix::sys::signal::Signal::SIGTERM,
                );
            }
            let code = match entry.child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(_) => -1,
            };
            entry.settle(code).await;
            tracing::info!(id = %id, command = %entry.command, exit_code = code, "background process killed");
        }

        entry.exit_code
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
