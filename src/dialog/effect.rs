//! Effects produced by state transitions

use crate::dialog::catalog::KeyboardSet;
use crate::dialog::state::Ticket;

/// Side effects to be executed after a state transition. The transition
/// function itself performs no I/O; the runtime executor interprets these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message back to the sender with an optional reply keyboard.
    Reply { text: String, keyboard: KeyboardSet },

    /// Insert-or-update the sender's directory record from scratch fields.
    UpsertEmployee { name: String, workplace: String },

    /// In-place name edit of an existing record (no confirmation step).
    UpdateName { name: String },

    /// In-place workplace edit of an existing record.
    UpdateWorkplace { workplace: String },

    /// Single admin-directed ticket notification.
    NotifyAdmin { ticket: Ticket },

    /// Fan a message out to all reachable employees (background task).
    Broadcast { body: String },

    /// Reply to the admin with directory stats.
    ReportStats,

    /// Reply to the admin with the full directory listing.
    ListEmployees,

    /// Delete all blocked records, report the count removed.
    PurgeUnreachable,

    /// Flag the sender's record unreachable.
    MarkUnreachable,

    /// Clear the sender's unreachable flag.
    MarkReachable,
}

impl Effect {
    pub fn reply(text: impl Into<String>, keyboard: KeyboardSet) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard,
        }
    }

    /// Reply with no keyboard change.
    pub fn say(text: impl Into<String>) -> Self {
        Effect::reply(text, KeyboardSet::None)
    }
}
