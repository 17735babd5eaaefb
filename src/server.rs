//! HTTP surface for remote automation clients.
//!
//! A thin adapter over the core components: each handler normalizes the
//! command, refuses interactive ones with a hint, consults the confirmation
//! broker when required, then delegates to the process registry or the
//! session registry. Responses are JSON; unknown ids are 404s with a
//! `detail` body. Handler failures come back as `exit_code: -1` with the
//! message in stderr -- they never take the process down, and neither does
//! a transport that fails to bind.

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::command;
use crate::config::AgentConfig;
use crate::confirm::{ConfirmationBroker, TicketOrigin};
use crate::process::{self, ExecResult};
use crate::prompt::{self, PromptInterrupter};
use crate::registry::ProcessRegistry;
use crate::session::SessionRegistry;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AgentConfig,
    pub broker: ConfirmationBroker,
    pub processes: ProcessRegistry,
    pub sessions: SessionRegistry,
    /// Session ids queued for automatic local attachment by the shell loop.
    pub attach_tx: mpsc::UnboundedSender<String>,
    /// Nudges the prompt so a queued attach is picked up promptly.
    pub interrupter: PromptInterrupter,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ShellCommand {
    pub command: String,
    #[serde(default)]
    pub stdin: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveStart {
    #[serde(default = "default_interactive_cmd")]
    pub cmd: String,
}

fn default_interactive_cmd() -> String {
    "bash".to_string()
}

#[derive(Debug, Deserialize)]
pub struct InputPayload {
    pub input: String,
}

// ---------------------------------------------------------------------------
// Router and transport
// ---------------------------------------------------------------------------

/// Build the route table. Paths here are unprefixed; [`serve`] nests them
/// under the configured root path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run", post(run_command))
        .route("/start", post(start_command))
        .route("/output/:id", get(get_output))
        .route("/kill/:id", post(kill_process))
        .route("/interactive/start", post(interactive_start))
        .route("/interactive/output/:session_id", get(interactive_output))
        .route("/interactive/input/:session_id", post(interactive_input))
        .route("/interactive/kill/:session_id", post(interactive_kill))
        .route("/openapi.json", get(openapi_document))
        .with_state(state)
}

/// Bind and serve the transport. Errors (e.g. port already in use) are
/// returned to the caller for logging; the local shell keeps running.
pub async fn serve(state: AppState, host: &str, port: u16, root_path: &str) -> anyhow::Result<()> {
    let routes = router(state);
    let app = if root_path.is_empty() || root_path == "/" {
        routes
    } else {
        Router::new().nest(root_path, routes)
    };

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP transport on {addr}"))?;
    tracing::info!(addr = %addr, root = %root_path, "HTTP transport listening");

    axum::serve(listener, app)
        .await
        .context("HTTP transport error")?;
    Ok(())
}

fn not_found(detail: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

// ---------------------------------------------------------------------------
// Non-interactive execution
// ---------------------------------------------------------------------------

async fn run_command(State(state): State<AppState>, Json(payload): Json<ShellCommand>) -> Response {
    let cmd = command::normalize(payload.command.trim());
    tracing::info!(command = %cmd, "/run");

    if command::is_interactive(&cmd) {
        return Json(ExecResult::failure(command::INTERACTIVE_HINT_RUN)).into_response();
    }
    let cmd = command::force_ls_color(&cmd);

    if state.config.require_confirmation && !state.broker.confirm(&cmd, TicketOrigin::Run).await {
        return Json(ExecResult::failure("Command execution declined by user.")).into_response();
    }

    echo_remote_command(&cmd).await;
    let result = process::run(&cmd, &payload.stdin, true).await;
    reprint_prompt().await;

    tracing::info!(command = %cmd, exit_code = result.exit_code, "/run completed");
    Json(result).into_response()
}

async fn start_command(
    State(state): State<AppState>,
    Json(payload): Json<ShellCommand>,
) -> Response {
    let cmd = command::normalize(payload.command.trim());
    tracing::info!(command = %cmd, "/start");

    if command::is_interactive(&cmd) {
        return Json(ExecResult::failure(command::INTERACTIVE_HINT_START)).into_response();
    }
    let cmd = command::force_ls_color(&cmd);

    if state.config.require_confirmation && !state.broker.confirm(&cmd, TicketOrigin::Start).await {
        return Json(json!({ "error": "Execution declined" })).into_response();
    }

    match state.processes.start(&cmd, &payload.stdin).await {
        Ok(id) => Json(json!({ "id": id })).into_response(),
        Err(e) => Json(ExecResult::failure(e)).into_response(),
    }
}

async fn get_output(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.processes.output(&id).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => not_found("Process not found"),
    }
}

async fn kill_process(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.processes.kill(&id).await {
        Some(exit_code) => Json(json!({
            "message": format!("Process {id} terminated."),
            "exit_code": exit_code,
        }))
        .into_response(),
        None => not_found("Process not found"),
    }
}

// ---------------------------------------------------------------------------
// Interactive sessions
// ---------------------------------------------------------------------------

async fn interactive_start(
    State(state): State<AppState>,
    payload: Option<Json<InteractiveStart>>,
) -> Response {
    let cmd = payload.map_or_else(default_interactive_cmd, |Json(p)| p.cmd);
    tracing::info!(command = %cmd, "/interactive/start");

    match state.sessions.spawn(&cmd).await {
        Ok(session_id) => {
            println!("[sgpt] Created interactive session {session_id} -> {cmd}");
            println!("[sgpt] To attach locally, type: attach {session_id}");
            // Queue the session for local attachment and abort the prompt
            // so the shell loop picks it up without waiting for input.
            let _ = state.attach_tx.send(session_id.clone());
            state.interrupter.interrupt();
            Json(json!({ "session_id": session_id })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": e })),
        )
            .into_response(),
    }
}

async fn interactive_output(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.sessions.drain_output(&session_id).await {
        Some(output) => Json(json!({ "output": output })).into_response(),
        None => not_found("Session not found"),
    }
}

async fn interactive_input(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<InputPayload>,
) -> Response {
    match state
        .sessions
        .write_input(&session_id, payload.input.as_bytes())
        .await
    {
        Some(Ok(())) => Json(json!({ "status": "input sent" })).into_response(),
        Some(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": e })),
        )
            .into_response(),
        None => not_found("Session not found"),
    }
}

async fn interactive_kill(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.sessions.kill(&session_id).await {
        Some(()) => Json(json!({ "status": format!("session {session_id} terminated") })).into_response(),
        None => not_found("Session not found"),
    }
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

/// Serve the static OpenAPI document from the working directory.
async fn openapi_document() -> Response {
    match tokio::fs::read_to_string("openapi.json").await {
        Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(doc) => Json(doc).into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": format!("invalid openapi.json: {e}") })),
            )
                .into_response(),
        },
        Err(e) => not_found(&format!("openapi.json unavailable: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Local-terminal echo for remote activity
// ---------------------------------------------------------------------------

/// Echo an approved remote command on the human's terminal in the remote
/// color, so they see what the agent is doing.
async fn echo_remote_command(cmd: &str) {
    let line = format!("\n{}{cmd}{}\n", prompt::REMOTE_COLOR, prompt::COLOR_RESET);
    let mut out = tokio::io::stdout();
    let _ = out.write_all(line.as_bytes()).await;
    let _ = out.flush().await;
}

/// Re-issue the prompt line after remote output has run over it.
async fn reprint_prompt() {
    let text = format!("\n{}", prompt::prompt_text());
    let mut out = tokio::io::stdout();
    let _ = out.write_all(text.as_bytes()).await;
    let _ = out.flush().await;
}
