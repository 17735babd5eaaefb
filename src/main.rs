//! Entry point for the sgpt agent.
//!
//! Initializes tracing (to stderr, so the prompt and child output own
//! stdout), wires the core components together, spawns the HTTP transport,
//! and hands the foreground to the local shell loop.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{self, EnvFilter};

use sgpt_agent::config::AgentConfig;
use sgpt_agent::confirm::ConfirmationBroker;
use sgpt_agent::prompt::Prompt;
use sgpt_agent::registry::ProcessRegistry;
use sgpt_agent::server::{self, AppState};
use sgpt_agent::session::SessionRegistry;
use sgpt_agent::shell::ShellLoop;

#[derive(Debug, Parser)]
#[command(
    name = "sgpt-agent",
    about = "Shell automation agent: a local prompt plus an HTTP bridge for LLM tools"
)]
struct Args {
    /// Disable confirmation prompts before remote command execution.
    #[arg(long)]
    no_confirm: bool,

    /// Enable transport logging (suppressed by default).
    #[arg(long)]
    no_quiet: bool,

    /// Address the HTTP transport binds to.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port the HTTP transport binds to.
    #[arg(long, default_value_t = 11000)]
    port: u16,

    /// Root path every HTTP route is nested under.
    #[arg(long, default_value = "/gpt-shell")]
    root_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AgentConfig {
        require_confirmation: !args.no_confirm,
        quiet_transport: !args.no_quiet,
    };

    let mut filter =
        EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if config.quiet_transport {
        filter = filter.add_directive("sgpt_agent::server=warn".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting sgpt agent v{}", env!("CARGO_PKG_VERSION"));

    let (prompt, interrupter) = Prompt::new();
    let broker = ConfirmationBroker::new(interrupter.clone());
    let sessions = SessionRegistry::new();
    let (attach_tx, attach_rx) = tokio::sync::mpsc::unbounded_channel();

    let state = AppState {
        config,
        broker: broker.clone(),
        processes: ProcessRegistry::new(),
        sessions: sessions.clone(),
        attach_tx,
        interrupter,
    };
    tokio::spawn(async move {
        if let Err(e) = server::serve(state, &args.host, args.port, &args.root_path).await {
            // A dead transport doesn't take the local shell down.
            tracing::error!(error = %e, "HTTP transport failed");
        }
    });

    ShellLoop::new(prompt, broker, sessions, attach_rx).run().await;
    Ok(())
}
