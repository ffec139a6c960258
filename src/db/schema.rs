//! Database schema and types

pub use crate::dialog::state::EmployeeRecord;
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS employees (
    user_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    workplace TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    last_active TEXT NOT NULL,
    is_blocked INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_employees_registered ON employees(registered_at DESC);
";

/// Directory counters surfaced by the admin `/stats` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub total: u64,
    pub blocked: u64,
    pub active: u64,
}
