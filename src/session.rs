//! Interactive sessions backed by a pseudo-terminal (PTY).
//!
//! Each session is a long-lived child attached to a real PTY, so programs
//! that demand a controlling terminal (shells, editors, REPLs) work
//! correctly. A reader task owns the master's read half: while the session
//! is detached, bytes accumulate in an in-memory buffer that remote polling
//! drains; while the local terminal is attached, bytes are fanned out to
//! the screen as well. Input is written raw to the master -- callers handle
//! newline and escape conventions themselves.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::command;

/// Chunk size for master-side PTY reads.
const PTY_READ_CHUNK: usize = 1024;

/// Where the reader fans bytes out while a local attacher is bound.
/// `None` means detached: buffer only.
type TerminalSink = Arc<Mutex<Option<tokio::io::Stdout>>>;

/// Shared write half of a session's PTY master.
pub type SessionWriter = Arc<Mutex<pty_process::OwnedWritePty>>;

/// What the shell loop gets back from [`SessionRegistry::attach`]: the
/// input side of the PTY plus a watch that flips when the session dies.
pub struct AttachHandle {
    pub writer: SessionWriter,
    pub alive: watch::Receiver<bool>,
}

/// Listing entry for `getsessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub pid: u32,
    pub alive: bool,
}

/// A live PTY session.
struct PtySession {
    pid: u32,
    child: tokio::process::Child,
    writer: SessionWriter,
    buffer: Arc<Mutex<Vec<u8>>>,
    sink: TerminalSink,
    alive: watch::Receiver<bool>,
    reader_task: JoinHandle<()>,
}

/// Registry of PTY sessions keyed by UUID.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, PtySession>>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a command on a fresh PTY and register it.
    ///
    /// The command goes through the metacharacter wrap rule and defaults to
    /// `bash` when empty. The child gets the PTY slave as its controlling
    /// terminal and `TERM=xterm-256color`; the reader task runs for the
    /// session's life.
    pub async fn spawn(&self, raw_cmd: &str) -> Result<String, String> {
        let argv = command::interactive_argv(raw_cmd);

        let (pty, pts) = pty_process::open().map_err(|e| format!("failed to open PTY: {e}"))?;
        pty.resize(pty_process::Size::new(24, 80))
            .map_err(|e| format!("failed to resize PTY: {e}"))?;

        let cmd = pty_process::Command::new(&argv[0])
            .args(&argv[1..])
            .env("TERM", "xterm-256color");
        let child = cmd
            .spawn(pts)
            .map_err(|e| format!("failed to spawn {argv:?} with PTY: {e}"))?;
        let pid = child.id().unwrap_or(0);

        let (read_pty, write_pty) = pty.into_split();

        let session_id = uuid::Uuid::new_v4().to_string();
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink: TerminalSink = Arc::new(Mutex::new(None));
        let (alive_tx, alive_rx) = watch::channel(true);

        let reader_task = spawn_reader(
            session_id.clone(),
            read_pty,
            buffer.clone(),
            sink.clone(),
            alive_tx,
        );

        tracing::info!(session = %session_id, pid, command = %raw_cmd, "interactive session created");

        let session = PtySession {
            pid,
            child,
            writer: Arc::new(Mutex::new(write_pty)),
            buffer,
            sink,
            alive: alive_rx,
            reader_task,
        };
        self.sessions.lock().await.insert(session_id.clone(), session);
        Ok(session_id)
    }

    /// Swap the session's accumulation buffer for an empty one and return
    /// the old contents. Two consecutive calls with no intervening child
    /// output yield an empty second result.
    pub async fn drain_output(&self, id: &str) -> Option<String> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(id)?;
        let mut buf = session.buffer.lock().await;
        let bytes = std::mem::take(&mut *buf);
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write bytes to the session's master fd, untranslated.
    pub async fn write_input(&self, id: &str, data: &[u8]) -> Option<Result<(), String>> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(id)?;
        let mut writer = session.writer.lock().await;
        let result = async {
            writer.write_all(data).await?;
            writer.flush().await
        }
        .await;
        Some(result.map_err(|e| format!("failed to write to PTY: {e}")))
    }

    /// Bind the session's output sink to the local terminal.
    ///
    /// While attached, PTY bytes go to both the screen and the buffer so
    /// detached polling never loses history. The returned handle carries
    /// the write half for local keystrokes and the alive watch so the
    /// attach loop notices session death.
    pub async fn attach(&self, id: &str) -> Option<AttachHandle> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(id)?;
        *session.sink.lock().await = Some(tokio::io::stdout());
        Some(AttachHandle {
            writer: session.writer.clone(),
            alive: session.alive.clone(),
        })
    }

    /// Revert the session's sink to buffer-only.
    pub async fn detach(&self, id: &str) {
        if let Some(session) = self.sessions.lock().await.get(id) {
            *session.sink.lock().await = None;
        }
    }

    /// Whether a session is still registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    /// Whether a session's child is still running.
    pub async fn is_alive(&self, id: &str) -> Option<bool> {
        let sessions = self.sessions.lock().await;
        sessions.get(id).map(|s| *s.alive.borrow())
    }

    /// Kill a session: SIGKILL to the child, cancel the reader, close the
    /// master, remove the entry. Every cleanup step is attempted even if an
    /// earlier one fails.
    pub async fn kill(&self, id: &str) -> Option<()> {
        let mut session = self.sessions.lock().await.remove(id)?;

        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(session.pid as i32),
            nix::sys::signal::Signal::SIGKILL,
        );
        session.reader_task.abort();

        // Reap the child with a bounded wait; SIGKILL makes this quick, and
        // dropping the session afterwards closes the master's write half.
        let _ = tokio::time::timeout(Duration::from_secs(1), session.child.wait()).await;

        tracing::info!(session = %id, pid = session.pid, "interactive session killed");
        Some(())
    }

    /// List all registered sessions.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .map(|(id, s)| SessionSummary {
                id: id.clone(),
                pid: s.pid,
                alive: *s.alive.borrow(),
            })
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader loop on the master's read half.
///
/// Bytes always land in the accumulation buffer; while a sink is bound they
/// are mirrored to it first. A zero-byte read or error means the child side
/// closed -- the loop ends and the alive flag flips, but the session stays
/// registered so the final buffer can still be drained (explicit kill
/// removes it).
fn spawn_reader(
    session_id: String,
    mut read_pty: pty_process::OwnedReadPty,
    buffer: Arc<Mutex<Vec<u8>>>,
    sink: TerminalSink,
    alive_tx: watch::Sender<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut chunk = [0u8; PTY_READ_CHUNK];
        loop {
            match read_pty.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Some(out) = sink.lock().await.as_mut() {
                        let _ = out.write_all(&chunk[..n]).await;
                        let _ = out.flush().await;
                    }
                    buffer.lock().await.extend_from_slice(&chunk[..n]);
                }
            }
        }
        tracing::info!(session = %session_id, "EOF from PTY");
        let _ = alive_tx.send(false);
    })
}
