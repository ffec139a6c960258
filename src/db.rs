//! Employee directory
//!
//! Durable store of employee records, keyed by the transport's stable user
//! identifier. The single `employees` table survives restarts; conversation
//! state does not live here.

mod schema;

pub use schema::{DirectoryStats, EmployeeRecord, SCHEMA};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Employee not found: {0}")]
    EmployeeNotFound(i64),
    #[error("Database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe directory handle
#[derive(Clone)]
pub struct Directory {
    conn: Arc<Mutex<Connection>>,
}

impl Directory {
    /// Open or create the directory database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory directory (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> DbResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Look up an employee record. Returns `None` for unknown identifiers;
    /// the caller decides whether a read *error* also degrades to absent.
    pub fn get(&self, user_id: i64) -> DbResult<Option<EmployeeRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, name, workplace, registered_at, last_active, is_blocked
             FROM employees WHERE user_id = ?1",
        )?;
        stmt.query_row(params![user_id], row_to_record)
            .optional()
            .map_err(DbError::from)
    }

    /// Insert-or-update an employee record.
    ///
    /// Updates name, workplace, `last_active` and clears `is_blocked`;
    /// `registered_at` is preserved from the first insert. The single
    /// conditional statement keeps concurrent upserts from losing updates.
    pub fn upsert(&self, user_id: i64, name: &str, workplace: &str) -> DbResult<EmployeeRecord> {
        let conn = self.lock()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO employees (user_id, name, workplace, registered_at, last_active, is_blocked)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)
             ON CONFLICT(user_id) DO UPDATE SET
                 name = excluded.name,
                 workplace = excluded.workplace,
                 last_active = excluded.last_active,
                 is_blocked = 0",
            params![user_id, name, workplace, now.to_rfc3339()],
        )?;

        let mut stmt = conn.prepare(
            "SELECT user_id, name, workplace, registered_at, last_active, is_blocked
             FROM employees WHERE user_id = ?1",
        )?;
        stmt.query_row(params![user_id], row_to_record)
            .map_err(DbError::from)
    }

    /// In-place name edit of an existing record.
    pub fn update_name(&self, user_id: i64, name: &str) -> DbResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE employees SET name = ?1, last_active = ?2 WHERE user_id = ?3",
            params![name, Utc::now().to_rfc3339(), user_id],
        )?;
        if updated == 0 {
            return Err(DbError::EmployeeNotFound(user_id));
        }
        Ok(())
    }

    /// In-place workplace edit of an existing record.
    pub fn update_workplace(&self, user_id: i64, workplace: &str) -> DbResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE employees SET workplace = ?1, last_active = ?2 WHERE user_id = ?3",
            params![workplace, Utc::now().to_rfc3339(), user_id],
        )?;
        if updated == 0 {
            return Err(DbError::EmployeeNotFound(user_id));
        }
        Ok(())
    }

    /// Record an inbound interaction. No-op for unknown users.
    pub fn touch_last_active(&self, user_id: i64) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE employees SET last_active = ?1 WHERE user_id = ?2",
            params![Utc::now().to_rfc3339(), user_id],
        )?;
        Ok(())
    }

    /// Flag a record unreachable (the transport reported revoked contact).
    /// A liveness hint, not deletion; no-op for unknown users.
    pub fn mark_unreachable(&self, user_id: i64) -> DbResult<()> {
        self.set_blocked(user_id, true)
    }

    /// Clear the unreachable flag.
    pub fn mark_reachable(&self, user_id: i64) -> DbResult<()> {
        self.set_blocked(user_id, false)
    }

    fn set_blocked(&self, user_id: i64, blocked: bool) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE employees SET is_blocked = ?1 WHERE user_id = ?2",
            params![blocked, user_id],
        )?;
        Ok(())
    }

    /// List employees, newest-registered first.
    pub fn list(&self, include_blocked: bool) -> DbResult<Vec<EmployeeRecord>> {
        let conn = self.lock()?;
        let sql = if include_blocked {
            "SELECT user_id, name, workplace, registered_at, last_active, is_blocked
             FROM employees ORDER BY registered_at DESC, user_id DESC"
        } else {
            "SELECT user_id, name, workplace, registered_at, last_active, is_blocked
             FROM employees WHERE is_blocked = 0 ORDER BY registered_at DESC, user_id DESC"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn stats(&self) -> DbResult<DirectoryStats> {
        let conn = self.lock()?;
        let (total, blocked): (u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_blocked), 0) FROM employees",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DirectoryStats {
            total,
            blocked,
            active: total - blocked,
        })
    }

    /// Delete all blocked records; returns the count removed.
    pub fn purge_unreachable(&self) -> DbResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM employees WHERE is_blocked = 1", [])?;
        Ok(removed)
    }

    /// Drop the backing table so every subsequent operation fails (tests).
    #[cfg(test)]
    pub(crate) fn drop_tables(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("DROP TABLE employees")?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmployeeRecord> {
    Ok(EmployeeRecord {
        user_id: row.get(0)?,
        name: row.get(1)?,
        workplace: row.get(2)?,
        registered_at: parse_datetime(&row.get::<_, String>(3)?),
        last_active: parse_datetime(&row.get::<_, String>(4)?),
        is_blocked: row.get(5)?,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
