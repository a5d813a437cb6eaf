//! Supervisor capacity, counted live from `projects`.
//!
//! `users.current_projects_count` is a cache for display. Decisions are made
//! on the live count, and any drift found on read is written back.

use rusqlite::{params, Connection, OptionalExtension};

use fyp_shared::capacity::CapacityStatus;
use fyp_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Number of `Ongoing` projects currently assigned to `supervisor`.
    pub fn live_supervision_count(&self, supervisor: UserId) -> Result<u32> {
        live_count(self.conn(), &supervisor.to_string()).map_err(StoreError::Sqlite)
    }

    /// Capacity verdict for `supervisor`, repairing the cached count if it
    /// has drifted. [`StoreError::NotFound`] if the user is not a supervisor.
    pub fn supervisor_capacity(&self, supervisor: UserId) -> Result<CapacityStatus> {
        let id = supervisor.to_string();
        let row: Option<(Option<u32>, u32)> = self
            .conn()
            .query_row(
                "SELECT max_projects, current_projects_count FROM users
                 WHERE id = ?1 AND role = 'supervisor'",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (max_projects, cached) = row.ok_or(StoreError::NotFound)?;

        let live = live_count(self.conn(), &id)?;
        if live != cached {
            tracing::debug!(supervisor = %supervisor, cached, live, "repairing cached project count");
            self.conn().execute(
                "UPDATE users SET current_projects_count = ?2 WHERE id = ?1",
                params![id, live],
            )?;
        }

        Ok(CapacityStatus::evaluate(live, max_projects))
    }
}

pub(crate) fn live_count(conn: &Connection, supervisor_id: &str) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE supervisor_id = ?1 AND status = 'Ongoing'",
        params![supervisor_id],
        |row| row.get(0),
    )
}

/// Overwrite the cached count with the live one.
pub(crate) fn refresh_cached_count(conn: &Connection, supervisor_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET current_projects_count =
             (SELECT COUNT(*) FROM projects WHERE supervisor_id = ?1 AND status = 'Ongoing')
         WHERE id = ?1",
        params![supervisor_id],
    )?;
    Ok(())
}
