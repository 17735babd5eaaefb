//! Confirmation broker: routes remote execution requests to the local human.
//!
//! A remote handler builds a ticket and awaits its one-shot decision. The
//! broker's dispatcher moves tickets from the intake queue to a pending
//! hand-off area in FIFO order and interrupts the shell's in-flight prompt;
//! the shell loop drains the pending area at the top of every iteration and
//! resolves each ticket at a `[Y/n]` prompt. The one-shot channel guarantees
//! every ticket resolves exactly once -- a dropped ticket or a shut-down
//! broker reads as decline on the handler side.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::prompt::PromptInterrupter;

/// Which execution path a ticket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOrigin {
    Run,
    Start,
}

/// A single approval request for one remote command.
pub struct ConfirmationTicket {
    pub id: String,
    pub command: String,
    pub origin: TicketOrigin,
    decision: oneshot::Sender<bool>,
}

impl ConfirmationTicket {
    /// Deliver the human's decision. Consumes the ticket, so a ticket can
    /// never be resolved twice.
    pub fn resolve(self, approve: bool) {
        let _ = self.decision.send(approve);
    }
}

/// Broker handle shared by the HTTP handlers and the shell loop.
#[derive(Clone)]
pub struct ConfirmationBroker {
    intake: mpsc::UnboundedSender<ConfirmationTicket>,
    pending: Arc<Mutex<VecDeque<ConfirmationTicket>>>,
}

impl ConfirmationBroker {
    /// Create the broker and start its dispatcher task.
    #[must_use]
    pub fn new(interrupter: PromptInterrupter) -> Self {
        let (intake, mut rx) = mpsc::unbounded_channel::<ConfirmationTicket>();
        let pending: Arc<Mutex<VecDeque<ConfirmationTicket>>> =
            Arc::new(Mutex::new(VecDeque::new()));

        let handoff = pending.clone();
        tokio::spawn(async move {
            // Tickets reach the hand-off area in arrival order; each arrival
            // aborts the prompt so the shell loop sees it promptly.
            while let Some(ticket) = rx.recv().await {
                tracing::info!(ticket = %ticket.id, command = %ticket.command, "confirmation requested");
                handoff.lock().await.push_back(ticket);
                interrupter.interrupt();
            }
        });

        Self { intake, pending }
    }

    /// Ask the human to approve a command. Resolves to `false` on decline
    /// or when the agent is shutting down.
    pub async fn confirm(&self, command: &str, origin: TicketOrigin) -> bool {
        let (tx, rx) = oneshot::channel();
        let ticket = ConfirmationTicket {
            id: uuid::Uuid::new_v4().to_string(),
            command: command.to_string(),
            origin,
            decision: tx,
        };
        if self.intake.send(ticket).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Take the next pending ticket, if any. The shell loop drains these
    /// before issuing a normal prompt, so a confirmation can never be
    /// starved by a busy user.
    pub async fn take_pending(&self) -> Option<ConfirmationTicket> {
        self.pending.lock().await.pop_front()
    }
}
