//! A shared shell for humans and LLM agents.
//!
//! One long-lived process hosts a local interactive prompt and an HTTP API
//! through which a remote automation client executes commands on the same
//! host. Both drivers share one working directory, one terminal, and one
//! set of child processes; the modules here mediate between them:
//!
//! - [`process`] / [`registry`] -- transient and background child execution
//!   with captured output
//! - [`session`] -- PTY-backed interactive sessions with attach/detach
//! - [`confirm`] -- the human approval gate for remote requests
//! - [`prompt`] / [`shell`] -- the cancellable local REPL
//! - [`server`] -- the HTTP surface

pub mod command;
pub mod config;
pub mod confirm;
pub mod process;
pub mod prompt;
pub mod registry;
pub mod server;
pub mod session;
pub mod shell;
