//! Deadline CRUD and the per-viewer visibility query.

use chrono::Utc;
use rusqlite::params;

use fyp_shared::types::{DeadlineId, ProjectId, Role, UserId};

use crate::convert::{enum_at, opt_uuid_at, time_at, uuid_at};
use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{Deadline, NewDeadline, User};

const DEADLINE_COLUMNS: &str = "id, title, description, deadline_date, scope, batch, department, \
     target_project_id, created_by, is_hard_deadline, created_at";

impl Database {
    /// Insert a deadline. The caller validates scope fields first; the
    /// schema re-checks them.
    /// Insert `new` as given. Callers pass it through
    /// [`NewDeadline::normalized`] first.
    pub fn create_deadline(&self, new: &NewDeadline, created_by: UserId) -> Result<Deadline> {
        let id = DeadlineId::new();

        self.conn().execute(
            "INSERT INTO deadlines (id, title, description, deadline_date, scope, batch,
                                    department, target_project_id, created_by,
                                    is_hard_deadline, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.to_string(),
                new.title,
                new.description,
                new.deadline_date.to_rfc3339(),
                new.scope.as_str(),
                new.batch,
                new.department,
                new.target_project.map(|p| p.to_string()),
                created_by.to_string(),
                new.is_hard_deadline,
                Utc::now().to_rfc3339(),
            ],
        )?;

        self.get_deadline(id)
    }

    pub fn get_deadline(&self, id: DeadlineId) -> Result<Deadline> {
        self.conn()
            .query_row(
                &format!("SELECT {DEADLINE_COLUMNS} FROM deadlines WHERE id = ?1"),
                params![id.to_string()],
                row_to_deadline,
            )
            .map_err(not_found)
    }

    /// Group deadlines targeting `project`, soonest first.
    pub fn list_project_deadlines(&self, project: ProjectId) -> Result<Vec<Deadline>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DEADLINE_COLUMNS} FROM deadlines
             WHERE target_project_id = ?1
             ORDER BY deadline_date ASC"
        ))?;
        let rows = stmt.query_map(params![project.to_string()], row_to_deadline)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Deadlines `viewer` can see, soonest first.
    ///
    /// Admins see everything. Others see Global deadlines, Batch deadlines
    /// for their own batch and department, and Group deadlines for their
    /// project or the projects they supervise.
    pub fn list_visible_deadlines(&self, viewer: &User) -> Result<Vec<Deadline>> {
        let supervising = (viewer.role == Role::Supervisor).then(|| viewer.id.to_string());

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DEADLINE_COLUMNS} FROM deadlines d
             WHERE ?1
                OR d.scope = 'Global'
                OR (d.scope = 'Batch' AND d.batch = ?2 AND d.department = ?3)
                OR (d.scope = 'Group' AND (
                       d.target_project_id = ?4
                       OR d.target_project_id IN
                          (SELECT id FROM projects WHERE supervisor_id = ?5)))
             ORDER BY d.deadline_date ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                viewer.role == Role::Admin,
                viewer.batch,
                viewer.department,
                viewer.project.map(|p| p.to_string()),
                supervising,
            ],
            row_to_deadline,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Returns `false` if the deadline did not exist.
    pub fn delete_deadline(&self, id: DeadlineId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM deadlines WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_deadline(row: &rusqlite::Row<'_>) -> rusqlite::Result<Deadline> {
    Ok(Deadline {
        id: DeadlineId(uuid_at(row, 0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        deadline_date: time_at(row, 3)?,
        scope: enum_at(row, 4)?,
        batch: row.get(5)?,
        department: row.get(6)?,
        target_project: opt_uuid_at(row, 7)?.map(ProjectId),
        created_by: opt_uuid_at(row, 8)?.map(UserId),
        is_hard_deadline: row.get(9)?,
        created_at: time_at(row, 10)?,
    })
}
