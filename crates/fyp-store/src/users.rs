//! CRUD operations for [`User`] records.

use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension};

use fyp_shared::types::{ProjectId, ProjectStatus, Role, UserId};

use crate::convert::{enum_at, json_at, opt_uuid_at, time_at, uuid_at};
use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{NewUser, PortfolioUpdate, ProfileUpdate, SocialLinks, User};

const USER_COLUMNS: &str = "id, name, email, role, department, batch, roll_no, expertise, \
     max_projects, current_projects_count, has_project, project_id, is_leader, skills, bio, \
     social_links, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new account. Emails are unique, case-insensitively.
    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        let id = UserId::new();
        let now = Utc::now();

        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, role, department, batch,
                                    roll_no, expertise, max_projects, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id.to_string(),
                    new.name,
                    new.email,
                    new.password_hash,
                    new.role.as_str(),
                    new.department,
                    new.batch,
                    new.roll_no,
                    serde_json::to_string(&new.expertise)?,
                    new.max_projects,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(format!("email {} is already registered", new.email))
                }
                other => StoreError::Sqlite(other),
            })?;

        tracing::debug!(user = %id, role = %new.role, "user created");
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Look up an account and its password hash by email, for login.
    pub fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![email.trim()],
                |row| Ok((row_to_user(row)?, row.get::<_, String>(17)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// List accounts ordered by name, optionally restricted to one role.
    pub fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE (?1 IS NULL OR role = ?1)
             ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(params![role.map(|r| r.as_str())], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn user_ids_with_role(&self, role: Role) -> Result<Vec<UserId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id FROM users WHERE role = ?1 ORDER BY created_at ASC")?;
        let rows = stmt.query_map(params![role.as_str()], |row| uuid_at(row, 0).map(UserId))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Students matching a batch and/or department (`None` matches any).
    pub fn student_ids_in_cohort(
        &self,
        batch: Option<&str>,
        department: Option<&str>,
    ) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT id FROM users
             WHERE role = 'student'
               AND (?1 IS NULL OR batch = ?1)
               AND (?2 IS NULL OR department = ?2)
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![batch, department], |row| {
            uuid_at(row, 0).map(UserId)
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn count_users_with_role(&self, role: Role) -> Result<u32> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a self-service portfolio edit. Absent fields are left alone.
    pub fn update_portfolio(&self, id: UserId, update: &PortfolioUpdate) -> Result<User> {
        let skills = update.skills.as_ref().map(serde_json::to_string).transpose()?;
        let links = update
            .social_links
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let affected = self.conn().execute(
            "UPDATE users SET
                 name = COALESCE(?2, name),
                 bio = COALESCE(?3, bio),
                 skills = COALESCE(?4, skills),
                 social_links = COALESCE(?5, social_links)
             WHERE id = ?1",
            params![id.to_string(), update.name, update.bio, skills, links],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }

    /// Apply an admin edit of role-specific fields.
    pub fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<User> {
        let expertise = update
            .expertise
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let affected = self.conn().execute(
            "UPDATE users SET
                 department = COALESCE(?2, department),
                 batch = COALESCE(?3, batch),
                 roll_no = COALESCE(?4, roll_no),
                 expertise = COALESCE(?5, expertise),
                 max_projects = COALESCE(?6, max_projects)
             WHERE id = ?1",
            params![
                id.to_string(),
                update.department,
                update.batch,
                update.roll_no,
                expertise,
                update.max_projects,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an account and cascade its project relationships.
    ///
    /// - Projects the user leads are deleted; their other members are
    ///   released (`has_project = false`).
    /// - Membership rows go with the user.
    /// - Each `(project, status)` in `reopen` loses its supervisor and moves
    ///   to `status`, provided the user still supervises it. The caller
    ///   decides which projects and which status from the lifecycle table.
    ///   Any other project the user supervised just loses the link.
    ///
    /// Returns `false` if no such user existed.
    pub fn delete_user(
        &mut self,
        id: UserId,
        reopen: &[(ProjectId, ProjectStatus)],
    ) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;
        let id_str = id.to_string();

        let exists: Option<String> = tx
            .query_row("SELECT id FROM users WHERE id = ?1", params![id_str], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Ok(false);
        }

        let led: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM projects WHERE leader_id = ?1")?;
            let rows = stmt.query_map(params![id_str], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        for project_id in &led {
            release_members(&tx, project_id)?;
            tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        }

        let now = Utc::now().to_rfc3339();
        let mut orphaned = 0;
        for (project, status) in reopen {
            orphaned += tx.execute(
                "UPDATE projects SET supervisor_id = NULL, status = ?3, updated_at = ?4
                 WHERE id = ?1 AND supervisor_id = ?2",
                params![project.to_string(), id_str, status.as_str(), now],
            )?;
        }
        tx.execute(
            "UPDATE projects SET supervisor_id = NULL WHERE supervisor_id = ?1",
            params![id_str],
        )?;

        tx.execute("DELETE FROM users WHERE id = ?1", params![id_str])?;
        tx.commit()?;

        tracing::info!(
            user = %id,
            deleted_projects = led.len(),
            orphaned_projects = orphaned,
            "user deleted"
        );
        Ok(true)
    }
}

/// Clear the project link on every user attached to `project_id`.
pub(crate) fn release_members(conn: &rusqlite::Connection, project_id: &str) -> Result<usize> {
    let released = conn.execute(
        "UPDATE users SET has_project = 0, project_id = NULL, is_leader = 0
         WHERE project_id = ?1
            OR id IN (SELECT user_id FROM project_members WHERE project_id = ?1)",
        params![project_id],
    )?;
    Ok(released)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let social_links: SocialLinks = json_at(row, 15)?;
    Ok(User {
        id: UserId(uuid_at(row, 0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role: enum_at(row, 3)?,
        department: row.get(4)?,
        batch: row.get(5)?,
        roll_no: row.get(6)?,
        expertise: json_at(row, 7)?,
        max_projects: row.get(8)?,
        current_projects_count: row.get(9)?,
        has_project: row.get(10)?,
        project: opt_uuid_at(row, 11)?.map(ProjectId),
        is_leader: row.get(12)?,
        skills: json_at(row, 13)?,
        bio: row.get(14)?,
        social_links,
        created_at: time_at(row, 16)?,
    })
}
