//! Conversation state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of an in-progress multi-step dialog.
///
/// A user with no active dialog has no stage at all (`ConversationState.stage`
/// is `None`); the universal fallback promotes that to either `AwaitingName`
/// (unknown user) or `MainMenu` (registered user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingName,
    AwaitingNameConfirmation,
    AwaitingWorkplace,
    AwaitingWorkplaceConfirmation,
    MainMenu,
    AwaitingProfileEditChoice,
    AwaitingNewName,
    AwaitingNewWorkplace,
    AwaitingProblemCategory,
}

/// Values collected mid-dialog, committed to the directory only at
/// confirmation points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScratchFields {
    pub name: Option<String>,
    pub workplace: Option<String>,
}

/// Per-user ephemeral dialog state. Exists only while a dialog is in
/// progress; not persisted across process restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub stage: Option<Stage>,
    pub fields: ScratchFields,
}

impl ConversationState {
    pub fn at(stage: Stage, fields: ScratchFields) -> Self {
        Self {
            stage: Some(stage),
            fields,
        }
    }

    /// Cleared state: no stage, no scratch fields.
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.stage.is_none()
    }
}

/// A one-shot problem report, materialized only to render the admin
/// notification. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub user_id: i64,
    pub name: String,
    pub workplace: String,
    pub problem: String,
}

/// Immutable configuration the transition function needs.
#[derive(Debug, Clone)]
pub struct DialogContext {
    /// Sole recipient of ticket notifications and sole authorized caller of
    /// privileged commands.
    pub admin_id: i64,
}

impl DialogContext {
    pub fn new(admin_id: i64) -> Self {
        Self { admin_id }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }
}

/// Durable employee record, keyed by the transport's stable user identifier.
///
/// A record exists iff the employee completed registration at least once.
/// `is_blocked` is a liveness hint, not a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub user_id: i64,
    pub name: String,
    pub workplace: String,
    pub registered_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub is_blocked: bool,
}
