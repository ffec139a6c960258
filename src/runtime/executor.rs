//! Effect executor and event-dispatch runtime

use super::traits::{SendError, Transport};
use crate::db::Directory;
use crate::dialog::{
    transition, ConversationState, DialogContext, Effect, EmployeeRecord, Event, KeyboardSet,
    Ticket,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Inter-send pause during broadcast fan-out. Rate-limit protection for the
/// shared transport; sustained full-speed sends risk throttling.
pub const BROADCAST_SEND_DELAY: Duration = Duration::from_millis(50);

const PERSIST_FAILED: &str = "⚠️ Could not save your data. Please try again later.";
const TICKET_NOT_DELIVERED: &str =
    "⚠️ Your ticket may not have reached the sysadmin. Please try again later.";
const BROADCAST_BUSY: &str = "📣 A broadcast is already in progress.";
const DIRECTORY_UNAVAILABLE: &str = "⚠️ Directory temporarily unavailable. Try again later.";

/// Aggregate outcome of a broadcast fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub newly_unreachable: usize,
    pub cancelled: bool,
}

/// Handle to a running broadcast task.
pub struct BroadcastHandle {
    pub cancel: CancellationToken,
    pub done: JoinHandle<BroadcastReport>,
}

/// Drives the dialog state machine: reads directory + conversation state,
/// runs the pure transition, then executes the resulting effects.
///
/// One inbound event is processed to completion before the next; callers
/// serialize access (the Telegram dispatcher holds this behind a mutex).
pub struct BotRuntime<T: Transport + 'static> {
    directory: Directory,
    transport: Arc<T>,
    ctx: DialogContext,
    /// Conversation State Store: per-user stage + scratch fields. In-memory
    /// only; in-progress dialogs are lost on restart by design.
    states: HashMap<i64, ConversationState>,
    broadcast: Option<BroadcastHandle>,
    broadcast_delay: Duration,
}

impl<T: Transport + 'static> BotRuntime<T> {
    pub fn new(directory: Directory, transport: Arc<T>, ctx: DialogContext) -> Self {
        Self {
            directory,
            transport,
            ctx,
            states: HashMap::new(),
            broadcast: None,
            broadcast_delay: BROADCAST_SEND_DELAY,
        }
    }

    /// Override the broadcast inter-send delay (tests).
    #[cfg(test)]
    pub fn with_broadcast_delay(mut self, delay: Duration) -> Self {
        self.broadcast_delay = delay;
        self
    }

    #[cfg(test)]
    pub fn conversation_state(&self, user_id: i64) -> ConversationState {
        self.states.get(&user_id).cloned().unwrap_or_default()
    }

    /// Process one inbound event to completion. Failures are contained to
    /// this event's response; the dispatch loop survives.
    pub async fn process(&mut self, sender: i64, event: Event) {
        // Read failures degrade to "absent" so the controller's decision
        // logic stays total.
        let record = match self.directory.get(sender) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(user_id = sender, error = %e, "Directory read failed, treating as absent");
                None
            }
        };

        if record.is_some() {
            if let Err(e) = self.directory.touch_last_active(sender) {
                tracing::warn!(user_id = sender, error = %e, "Failed to touch last_active");
            }
        }

        let state = self.states.get(&sender).cloned().unwrap_or_default();
        let result = transition(sender, &state, record.as_ref(), &self.ctx, &event);

        tracing::debug!(
            user_id = sender,
            from = ?state.stage,
            to = ?result.state.stage,
            effects = result.effects.len(),
            "Transition"
        );

        let final_state = self
            .execute_effects(sender, &state, result.state, result.effects)
            .await;

        if final_state == ConversationState::cleared() {
            self.states.remove(&sender);
        } else {
            self.states.insert(sender, final_state);
        }
    }

    /// Execute effects in order. A failed write aborts the remaining effects
    /// (no success message after a failed save) and may override the
    /// post-transition state.
    async fn execute_effects(
        &mut self,
        sender: i64,
        old_state: &ConversationState,
        new_state: ConversationState,
        effects: Vec<Effect>,
    ) -> ConversationState {
        let mut final_state = new_state;

        for effect in effects {
            match effect {
                Effect::Reply { text, keyboard } => {
                    self.send_to(sender, &text, keyboard).await;
                }

                Effect::UpsertEmployee { name, workplace } => {
                    if let Err(e) = self.directory.upsert(sender, &name, &workplace) {
                        tracing::error!(user_id = sender, error = %e, "Upsert failed");
                        // Leave the dialog in its retryable stage.
                        final_state = old_state.clone();
                        self.send_to(sender, PERSIST_FAILED, KeyboardSet::None).await;
                        break;
                    }
                    tracing::info!(user_id = sender, %name, %workplace, "Employee registered");
                }

                Effect::UpdateName { name } => {
                    if let Err(e) = self.directory.update_name(sender, &name) {
                        tracing::error!(user_id = sender, error = %e, "Name update failed");
                        final_state = old_state.clone();
                        self.send_to(sender, PERSIST_FAILED, KeyboardSet::None).await;
                        break;
                    }
                }

                Effect::UpdateWorkplace { workplace } => {
                    if let Err(e) = self.directory.update_workplace(sender, &workplace) {
                        tracing::error!(user_id = sender, error = %e, "Workplace update failed");
                        final_state = old_state.clone();
                        self.send_to(sender, PERSIST_FAILED, KeyboardSet::None).await;
                        break;
                    }
                }

                Effect::NotifyAdmin { ticket } => {
                    if !self.deliver_ticket(&ticket).await {
                        // The submitter must know their ticket may be lost,
                        // and must not be stuck mid-dialog.
                        self.send_to(sender, TICKET_NOT_DELIVERED, KeyboardSet::Remove)
                            .await;
                        final_state = ConversationState::cleared();
                        break;
                    }
                    tracing::info!(
                        user_id = ticket.user_id,
                        problem = %ticket.problem,
                        "Ticket forwarded to admin"
                    );
                }

                Effect::Broadcast { body } => self.start_broadcast(body).await,

                Effect::ReportStats => {
                    let text = match self.directory.stats() {
                        Ok(s) => format!(
                            "📊 Employees: {} total, {} active, {} blocked",
                            s.total, s.active, s.blocked
                        ),
                        Err(e) => {
                            tracing::error!(error = %e, "Stats query failed");
                            DIRECTORY_UNAVAILABLE.to_string()
                        }
                    };
                    self.send_to(sender, &text, KeyboardSet::None).await;
                }

                Effect::ListEmployees => {
                    let text = match self.directory.list(true) {
                        Ok(records) => render_roster(&records),
                        Err(e) => {
                            tracing::error!(error = %e, "Roster query failed");
                            DIRECTORY_UNAVAILABLE.to_string()
                        }
                    };
                    self.send_to(sender, &text, KeyboardSet::None).await;
                }

                Effect::PurgeUnreachable => {
                    let text = match self.directory.purge_unreachable() {
                        Ok(n) => format!("🧹 Removed {n} blocked employee record(s)."),
                        Err(e) => {
                            tracing::error!(error = %e, "Purge failed");
                            DIRECTORY_UNAVAILABLE.to_string()
                        }
                    };
                    self.send_to(sender, &text, KeyboardSet::None).await;
                }

                Effect::MarkUnreachable => {
                    if let Err(e) = self.directory.mark_unreachable(sender) {
                        tracing::warn!(user_id = sender, error = %e, "mark_unreachable failed");
                    }
                }

                Effect::MarkReachable => {
                    if let Err(e) = self.directory.mark_reachable(sender) {
                        tracing::warn!(user_id = sender, error = %e, "mark_reachable failed");
                    }
                }
            }
        }

        final_state
    }

    /// Send to a user, classifying failures into the directory's
    /// reachability flag.
    async fn send_to(&self, recipient: i64, text: &str, keyboard: KeyboardSet) {
        match self.transport.send(recipient, text, keyboard).await {
            Ok(()) => {}
            Err(SendError::RecipientUnreachable) => {
                tracing::info!(user_id = recipient, "Recipient unreachable, flagging");
                if let Err(e) = self.directory.mark_unreachable(recipient) {
                    tracing::warn!(user_id = recipient, error = %e, "mark_unreachable failed");
                }
            }
            Err(SendError::Other(reason)) => {
                tracing::warn!(user_id = recipient, %reason, "Send failed");
            }
        }
    }

    /// Single admin-directed send; returns whether delivery succeeded.
    async fn deliver_ticket(&self, ticket: &Ticket) -> bool {
        let text = format!(
            "🚨 New ticket!\n\n👤 Name: {}\n📍 Workplace: {}\n❓ Problem: {}\n🆔 ID: {}",
            ticket.name, ticket.workplace, ticket.problem, ticket.user_id
        );
        match self.transport.send(self.ctx.admin_id, &text, KeyboardSet::None).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Ticket notification to admin failed");
                false
            }
        }
    }

    /// Spawn the broadcast fan-out as a cancellable background task so
    /// inbound event processing is never blocked by it. The completion
    /// report goes back to the admin through the outbound channel.
    async fn start_broadcast(&mut self, body: String) {
        if let Some(handle) = &self.broadcast {
            if !handle.done.is_finished() {
                self.send_to(self.ctx.admin_id, BROADCAST_BUSY, KeyboardSet::None)
                    .await;
                return;
            }
        }

        let recipients = match self.directory.list(false) {
            Ok(records) => records.into_iter().map(|r| r.user_id).collect::<Vec<_>>(),
            Err(e) => {
                tracing::error!(error = %e, "Broadcast recipient query failed");
                self.send_to(self.ctx.admin_id, DIRECTORY_UNAVAILABLE, KeyboardSet::None)
                    .await;
                return;
            }
        };

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let transport = Arc::clone(&self.transport);
        let directory = self.directory.clone();
        let admin_id = self.ctx.admin_id;
        let delay = self.broadcast_delay;

        tracing::info!(recipients = recipients.len(), "Broadcast starting");

        let done = tokio::spawn(async move {
            let report =
                run_broadcast(&transport, &directory, &recipients, &body, delay, &task_cancel)
                    .await;

            let mut summary = format!(
                "📣 Broadcast finished: {}/{} delivered, {} failed ({} newly unreachable)",
                report.delivered, report.total, report.failed, report.newly_unreachable
            );
            if report.cancelled {
                summary.push_str(" — cancelled early, partial result");
            }
            if let Err(e) = transport.send(admin_id, &summary, KeyboardSet::None).await {
                tracing::warn!(error = %e, "Failed to deliver broadcast report");
            }
            report
        });

        self.broadcast = Some(BroadcastHandle { cancel, done });
    }

    /// Await the running broadcast, if any, and return its report.
    pub async fn finish_broadcast(&mut self) -> Option<BroadcastReport> {
        let handle = self.broadcast.take()?;
        match handle.done.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Broadcast task panicked");
                None
            }
        }
    }

    /// Request cancellation of the running broadcast without awaiting it.
    pub fn cancel_broadcast(&self) {
        if let Some(handle) = &self.broadcast {
            handle.cancel.cancel();
        }
    }
}

/// Sequential fan-out with per-recipient outcome classification. Failures
/// are recorded, never retried; repeat sends are the caller's decision.
async fn run_broadcast<T: Transport>(
    transport: &T,
    directory: &Directory,
    recipients: &[i64],
    body: &str,
    delay: Duration,
    cancel: &CancellationToken,
) -> BroadcastReport {
    let mut report = BroadcastReport {
        total: recipients.len(),
        delivered: 0,
        failed: 0,
        newly_unreachable: 0,
        cancelled: false,
    };

    for (i, &recipient) in recipients.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        match transport.send(recipient, body, KeyboardSet::None).await {
            Ok(()) => report.delivered += 1,
            Err(SendError::RecipientUnreachable) => {
                report.failed += 1;
                report.newly_unreachable += 1;
                if let Err(e) = directory.mark_unreachable(recipient) {
                    tracing::warn!(user_id = recipient, error = %e, "mark_unreachable failed");
                }
            }
            Err(SendError::Other(reason)) => {
                report.failed += 1;
                tracing::warn!(user_id = recipient, %reason, "Broadcast send failed");
            }
        }

        if i + 1 < recipients.len() {
            tokio::select! {
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    report
}

fn render_roster(records: &[EmployeeRecord]) -> String {
    if records.is_empty() {
        return "📭 Directory is empty".to_string();
    }
    let mut text = String::from("👥 Employees (newest first):\n");
    for r in records {
        let flag = if r.is_blocked { " [blocked]" } else { "" };
        text.push_str(&format!(
            "• {} — {} (id {}){}\n",
            r.name, r.workplace, r.user_id, flag
        ));
    }
    text
}
