//! Cancellable line input for the local terminal.
//!
//! The shell loop needs a prompt read that someone else can abort: when a
//! remote request arrives mid-prompt, the broker must be able to terminate
//! the in-flight read with a sentinel the loop can tell apart from
//! end-of-input. The reader is a select over buffered stdin lines, Ctrl-C,
//! and an interrupt [`Notify`]; stdin state survives an interrupted read,
//! so nothing the human typed is lost.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Notify;

pub const COLOR_WHITE: &str = "\x1b[97m";
pub const COLOR_RESET: &str = "\x1b[0m";
/// Color remote-initiated commands are echoed in on the local terminal.
pub const REMOTE_COLOR: &str = "\x1b[38;2;223;155;255m";

/// What a prompt read resolved to.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A full line, without the trailing newline.
    Line(String),
    /// End of input, or Ctrl-C. The human is done.
    Eof,
    /// The read was aborted from outside. Not an input condition: the loop
    /// should re-check its queues and prompt again.
    Interrupted,
}

/// Handle other tasks use to abort the in-flight prompt read.
///
/// An interrupt fired while no read is in flight is remembered and consumed
/// by the next read; that read resolves `Interrupted` immediately, which is
/// harmless -- the loop drains its queues and prompts again.
#[derive(Clone)]
pub struct PromptInterrupter {
    notify: Arc<Notify>,
}

impl PromptInterrupter {
    /// Abort the current (or next) prompt read.
    pub fn interrupt(&self) {
        self.notify.notify_one();
    }
}

/// Line reader over the process's stdin.
pub struct Prompt {
    lines: Lines<BufReader<Stdin>>,
    interrupt: Arc<Notify>,
}

impl Prompt {
    /// Create the prompt and its interrupter handle.
    #[must_use]
    pub fn new() -> (Self, PromptInterrupter) {
        let notify = Arc::new(Notify::new());
        (
            Self {
                lines: BufReader::new(tokio::io::stdin()).lines(),
                interrupt: notify.clone(),
            },
            PromptInterrupter { notify },
        )
    }

    /// Print `prompt_text` and read one line.
    pub async fn read_line(&mut self, prompt_text: &str) -> ReadOutcome {
        if !prompt_text.is_empty() {
            let mut out = tokio::io::stdout();
            let _ = out.write_all(prompt_text.as_bytes()).await;
            let _ = out.flush().await;
        }

        tokio::select! {
            _ = self.interrupt.notified() => ReadOutcome::Interrupted,
            _ = tokio::signal::ctrl_c() => ReadOutcome::Eof,
            line = self.lines.next_line() => match line {
                Ok(Some(line)) => ReadOutcome::Line(line),
                Ok(None) | Err(_) => ReadOutcome::Eof,
            },
        }
    }
}

/// The colored `(sgpt) user@host:cwd$ ` prompt line.
#[must_use]
pub fn prompt_text() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "user".to_string());
    let host = nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".to_string());
    format!("{COLOR_WHITE}(sgpt){COLOR_RESET} {user}@{host}:{cwd}$ ")
}
