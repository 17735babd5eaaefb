//! The local shell loop: the human's REPL and the UI surface for remote
//! confirmations.
//!
//! Every iteration drains pending confirmation tickets first, then pending
//! auto-attach requests from the HTTP side, and only then issues the normal
//! prompt. Built-ins (`cd`, `attach`, `getsessions`, `exit`) are handled
//! here; interactive commands go through the PTY registry with the local
//! terminal attached immediately; everything else runs as a streamed
//! one-shot.

use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::command;
use crate::confirm::{ConfirmationBroker, ConfirmationTicket};
use crate::process;
use crate::prompt::{self, Prompt, ReadOutcome};
use crate::session::SessionRegistry;

pub struct ShellLoop {
    prompt: Prompt,
    broker: ConfirmationBroker,
    sessions: SessionRegistry,
    attach_rx: mpsc::UnboundedReceiver<String>,
}

impl ShellLoop {
    #[must_use]
    pub fn new(
        prompt: Prompt,
        broker: ConfirmationBroker,
        sessions: SessionRegistry,
        attach_rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            prompt,
            broker,
            sessions,
            attach_rx,
        }
    }

    /// Drive the REPL until the human exits. Only `exit`, EOF, or Ctrl-C at
    /// the main prompt terminate the agent; child errors print and
    /// re-prompt.
    pub async fn run(mut self) {
        loop {
            while let Some(ticket) = self.broker.take_pending().await {
                self.resolve_ticket(ticket).await;
            }

            while let Ok(session_id) = self.attach_rx.try_recv() {
                println!("auto attaching session...");
                self.attach_local(&session_id).await;
            }

            match self.prompt.read_line(&prompt::prompt_text()).await {
                // Aborted from outside: no input this iteration, re-check
                // the queues.
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => {
                    println!("Exiting SGPT shell.");
                    std::process::exit(0);
                }
                ReadOutcome::Line(line) => self.dispatch(line.trim()).await,
            }
        }
    }

    /// Present one confirmation ticket to the human and resolve it.
    ///
    /// Empty input or `y` (case-insensitive) approves; anything else
    /// declines, as does EOF, Ctrl-C, or another interruption.
    async fn resolve_ticket(&mut self, ticket: ConfirmationTicket) {
        println!("\n[sgpt] GPT wants to run:\n    {}\n", ticket.command);
        match self.prompt.read_line("Confirm execution? [Y/n] ").await {
            ReadOutcome::Line(answer) => {
                let answer = answer.trim().to_lowercase();
                if answer.is_empty() || answer == "y" {
                    println!("[sgpt] Command confirmed.\n");
                    ticket.resolve(true);
                } else {
                    println!("[sgpt] Command declined.\n");
                    ticket.resolve(false);
                }
            }
            ReadOutcome::Eof | ReadOutcome::Interrupted => ticket.resolve(false),
        }
    }

    async fn dispatch(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if line.eq_ignore_ascii_case("exit") {
            println!("Exiting SGPT shell.");
            std::process::exit(0);
        }
        if line.eq_ignore_ascii_case("getsessions") {
            self.print_sessions().await;
            return;
        }

        let tokens = shell_words::split(line).unwrap_or_default();
        match tokens.first().map(String::as_str) {
            Some("cd") => {
                self.change_dir(&tokens);
                return;
            }
            Some("attach") => {
                if tokens.len() == 2 {
                    self.attach_local(&tokens[1]).await;
                } else {
                    println!("Usage: attach <session_id>");
                }
                return;
            }
            _ => {}
        }

        let line = command::force_ls_color(line);
        if command::is_interactive(&line) {
            self.run_interactive(&line).await;
            return;
        }

        // One-shot: output streams onto the terminal as it arrives. Spawn
        // failures produce nothing live, so surface them here.
        let result = process::run(&line, "", true).await;
        if result.exit_code == -1 && result.stdout.is_empty() && !result.stderr.is_empty() {
            println!("[sgpt] Error executing command: {}", result.stderr.trim_end());
        }
    }

    /// `cd [path]`: no argument means home. Mutates the agent's working
    /// directory, so every later spawn from either driver sees it.
    fn change_dir(&self, tokens: &[String]) {
        let target = match tokens.get(1) {
            Some(path) => expand_user(path),
            None => dirs::home_dir(),
        };
        match target {
            Some(path) => {
                if let Err(e) = std::env::set_current_dir(&path) {
                    println!("cd: {e}");
                }
            }
            None => println!("cd: cannot determine home directory"),
        }
    }

    async fn print_sessions(&self) {
        let sessions = self.sessions.list().await;
        if sessions.is_empty() {
            println!("[sgpt] No active sessions.");
            return;
        }
        println!("[sgpt] Active interactive sessions:");
        for s in sessions {
            println!("  - {} (pid={})", s.id, s.pid);
        }
    }

    /// Bind the local terminal to a PTY session: its output starts landing
    /// on the screen via the reader's sink, and every line typed here is
    /// piped to the session's master. Ends on EOF, interruption, or session
    /// death, then detaches.
    async fn attach_local(&mut self, session_id: &str) {
        let Some(mut handle) = self.sessions.attach(session_id).await else {
            println!("No such session: {session_id}");
            return;
        };
        println!("[sgpt] Attaching local shell to session {session_id}...\n");

        loop {
            if !*handle.alive.borrow() {
                break;
            }
            tokio::select! {
                changed = handle.alive.changed() => {
                    if changed.is_err() || !*handle.alive.borrow() {
                        break;
                    }
                }
                outcome = self.prompt.read_line("") => match outcome {
                    ReadOutcome::Line(mut input) => {
                        input.push('\n');
                        let mut writer = handle.writer.lock().await;
                        if writer.write_all(input.as_bytes()).await.is_err() {
                            break;
                        }
                        let _ = writer.flush().await;
                    }
                    ReadOutcome::Eof | ReadOutcome::Interrupted => break,
                },
            }
        }

        self.sessions.detach(session_id).await;
        println!("\n[sgpt] Detaching from session {session_id}.\n");
    }

    /// Launch an interactive command through the PTY registry with the
    /// terminal attached from the start. A session whose child died during
    /// the attach is reaped here; detaching from a live one leaves it
    /// available for re-attach.
    async fn run_interactive(&mut self, cmd_line: &str) {
        match self.sessions.spawn(cmd_line).await {
            Ok(session_id) => {
                self.attach_local(&session_id).await;
                if self.sessions.is_alive(&session_id).await == Some(false) {
                    let _ = self.sessions.kill(&session_id).await;
                }
            }
            Err(e) => println!("[sgpt] Error launching interactive command: {e}"),
        }
    }
}

/// `~` and `~/...` expansion for the `cd` builtin.
fn expand_user(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    Some(PathBuf::from(path))
}
