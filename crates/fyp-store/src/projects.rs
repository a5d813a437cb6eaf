//! Persistence for the [`Project`] aggregate.
//!
//! Lifecycle writes are conditional updates: each one names the status it
//! expects to find, and reports [`StoreError::Conflict`] when the row has
//! moved on. Nested documents (tasks, roadmap, submissions) are rewritten
//! as a whole through [`Database::update_work`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use fyp_shared::constants::DEFAULT_MAX_PROJECTS;
use fyp_shared::types::{ProjectId, ProjectStatus, RequestStatus, UserId};

use crate::capacity::{live_count, refresh_cached_count};
use crate::convert::{enum_at, json_at, opt_json_at, opt_uuid_at, time_at, uuid_at};
use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{Grade, NewProject, Project, ProjectFilter, SupervisionRequest};
use crate::users::release_members;

const PROJECT_COLUMNS: &str = "id, title, description, proposal_url, leader_id, supervisor_id, \
     status, submissions, tasks, roadmap, grade, admin_feedback, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a `Pending` proposal and claim every team member.
    ///
    /// Each member (leader first) must be a student without a project; the
    /// claim is a conditional update so two proposals racing for the same
    /// student cannot both win. Any failure rolls back the whole proposal.
    pub fn insert_proposal(&mut self, new: &NewProject) -> Result<Project> {
        let id = ProjectId::new();
        let id_str = id.to_string();
        let now = new.created_at.to_rfc3339();

        let mut team = vec![new.leader];
        for member in &new.members {
            if !team.contains(member) {
                team.push(*member);
            }
        }

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO projects (id, title, description, proposal_url, leader_id, status,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'Pending', ?6, ?6)",
            params![
                id_str,
                new.title,
                new.description,
                new.proposal_url,
                new.leader.to_string(),
                now,
            ],
        )?;

        for (position, member) in team.iter().enumerate() {
            let is_leader = *member == new.leader;
            let claimed = tx.execute(
                "UPDATE users SET has_project = 1, project_id = ?2, is_leader = ?3
                 WHERE id = ?1 AND role = 'student' AND has_project = 0",
                params![member.to_string(), id_str, is_leader],
            )?;
            if claimed == 0 {
                return Err(StoreError::Conflict(format!(
                    "user {member} is not a student without a project"
                )));
            }
            tx.execute(
                "INSERT INTO project_members (project_id, user_id, position) VALUES (?1, ?2, ?3)",
                params![id_str, member.to_string(), position as i64],
            )?;
        }

        tx.commit()?;
        tracing::debug!(project = %id, members = team.len(), "proposal stored");
        self.get_project(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a project with members, requests and derived progress.
    pub fn get_project(&self, id: ProjectId) -> Result<Project> {
        load_project(self.conn(), id)
    }

    /// List projects newest first. Filters combine with AND.
    pub fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p
             WHERE (?1 IS NULL OR p.status = ?1)
               AND (?2 IS NULL OR EXISTS (
                     SELECT 1 FROM project_members m
                     WHERE m.project_id = p.id AND m.user_id = ?2))
               AND (?3 IS NULL OR p.supervisor_id = ?3 OR EXISTS (
                     SELECT 1 FROM supervision_requests r
                     WHERE r.project_id = p.id AND r.teacher_id = ?3))
             ORDER BY p.created_at DESC"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.status.map(|s| s.as_str()),
                filter.member.map(|m| m.to_string()),
                filter.supervisor.map(|s| s.to_string()),
            ],
            row_to_project,
        )?;

        let mut projects = Vec::new();
        for row in rows {
            let mut project = row?;
            load_relations(self.conn(), &mut project)?;
            projects.push(project);
        }
        Ok(projects)
    }

    /// Ids of the projects `supervisor` currently holds, any status.
    pub fn supervised_project_ids(&self, supervisor: UserId) -> Result<Vec<ProjectId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id FROM projects WHERE supervisor_id = ?1")?;
        let rows = stmt.query_map(params![supervisor.to_string()], |row| {
            uuid_at(row, 0).map(ProjectId)
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Lifecycle writes
    // ------------------------------------------------------------------

    /// Move a project from `from` to `to`, keeping the assigned supervisor's
    /// cached count in step.
    pub fn set_status(&mut self, id: ProjectId, from: ProjectStatus, to: ProjectStatus) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        let affected = tx.execute(
            "UPDATE projects SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
            params![id.to_string(), from.as_str(), to.as_str(), Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(conflict_for(&tx, id)?);
        }

        let supervisor: Option<String> = tx.query_row(
            "SELECT supervisor_id FROM projects WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        if let Some(supervisor) = supervisor {
            refresh_cached_count(&tx, &supervisor)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Reject a `Pending` proposal and release every member so they can
    /// propose again. Returns the number of users released.
    pub fn reject_proposal(&mut self, id: ProjectId) -> Result<usize> {
        let id_str = id.to_string();
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let affected = tx.execute(
            "UPDATE projects SET status = 'Rejected', updated_at = ?2
             WHERE id = ?1 AND status = 'Pending'",
            params![id_str, Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(conflict_for(&tx, id)?);
        }

        let released = release_members(&tx, &id_str)?;
        tx.commit()?;
        Ok(released)
    }

    /// Record (or re-send after a decline) a supervision request.
    pub fn send_request(&self, id: ProjectId, teacher: UserId, at: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "INSERT INTO supervision_requests (project_id, teacher_id, status, request_date)
             VALUES (?1, ?2, 'Sent', ?3)
             ON CONFLICT (project_id, teacher_id) DO UPDATE
                 SET status = 'Sent', request_date = excluded.request_date
                 WHERE supervision_requests.status IN ('Rejected', 'Cancelled')",
            params![id.to_string(), teacher.to_string(), at.to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(StoreError::Conflict(
                "a request to this supervisor is already pending".to_string(),
            ));
        }
        Ok(())
    }

    /// Mark an open request as declined.
    pub fn decline_request(&self, id: ProjectId, teacher: UserId) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE supervision_requests SET status = 'Rejected'
             WHERE project_id = ?1 AND teacher_id = ?2 AND status = 'Sent'",
            params![id.to_string(), teacher.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::Conflict(
                "there is no open request for this supervisor".to_string(),
            ));
        }
        Ok(())
    }

    /// Attach `supervisor` to a project in `expected` status and move it to
    /// `Ongoing`, atomically against the supervisor's live capacity.
    ///
    /// The capacity check and the write are one `UPDATE`, run inside an
    /// `IMMEDIATE` transaction, so concurrent assignments cannot jointly
    /// exceed the limit. On success the supervisor's own request (if any)
    /// becomes `Accepted` and every other open request is `Cancelled`;
    /// the number of cancelled requests is returned.
    pub fn assign_supervisor(
        &mut self,
        id: ProjectId,
        supervisor: UserId,
        expected: ProjectStatus,
    ) -> Result<usize> {
        let id_str = id.to_string();
        let sup_str = supervisor.to_string();
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let affected = tx.execute(
            "UPDATE projects SET supervisor_id = ?2, status = 'Ongoing', updated_at = ?4
             WHERE id = ?1
               AND status = ?3
               AND supervisor_id IS NULL
               AND EXISTS (SELECT 1 FROM users WHERE id = ?2 AND role = 'supervisor')
               AND (SELECT COUNT(*) FROM projects
                    WHERE supervisor_id = ?2 AND status = 'Ongoing')
                   < (SELECT COALESCE(max_projects, ?5) FROM users WHERE id = ?2)",
            params![
                id_str,
                sup_str,
                expected.as_str(),
                Utc::now().to_rfc3339(),
                DEFAULT_MAX_PROJECTS,
            ],
        )?;

        if affected == 0 {
            return Err(diagnose_assignment(&tx, id, supervisor, expected)?);
        }

        tx.execute(
            "UPDATE supervision_requests SET status = 'Accepted'
             WHERE project_id = ?1 AND teacher_id = ?2",
            params![id_str, sup_str],
        )?;
        let cancelled = tx.execute(
            "UPDATE supervision_requests SET status = 'Cancelled'
             WHERE project_id = ?1 AND teacher_id != ?2 AND status = 'Sent'",
            params![id_str, sup_str],
        )?;
        refresh_cached_count(&tx, &sup_str)?;

        tx.commit()?;
        tracing::debug!(project = %id, supervisor = %supervisor, cancelled, "supervisor assigned");
        Ok(cancelled)
    }

    /// Store the final grade and complete the project. Fails if a grade is
    /// already present, so a project is graded at most once.
    pub fn set_grade(&mut self, id: ProjectId, grade: &Grade) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        let affected = tx.execute(
            "UPDATE projects SET grade = ?2, status = 'Completed', updated_at = ?3
             WHERE id = ?1
               AND grade IS NULL
               AND supervisor_id = ?4
               AND status IN ('Pending Evaluation', 'Revision Requested')",
            params![
                id.to_string(),
                serde_json::to_string(grade)?,
                grade.graded_at.to_rfc3339(),
                grade.graded_by.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(conflict_for(&tx, id)?);
        }
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Work documents
    // ------------------------------------------------------------------

    /// Read-modify-write the project's work documents in one transaction.
    ///
    /// `f` sees the whole aggregate, but only `tasks`, `roadmap`,
    /// `submissions` and `admin_feedback` are written back; lifecycle fields
    /// change only through the dedicated methods above. If `f` fails nothing
    /// is written.
    pub fn update_work<T, E, F>(&mut self, id: ProjectId, f: F) -> std::result::Result<(Project, T), E>
    where
        F: FnOnce(&mut Project) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let mut project = load_project(&tx, id)?;
        let out = f(&mut project)?;

        project.updated_at = Utc::now();
        let submissions = serde_json::to_string(&project.submissions).map_err(StoreError::from)?;
        let tasks = serde_json::to_string(&project.tasks).map_err(StoreError::from)?;
        let roadmap = serde_json::to_string(&project.roadmap).map_err(StoreError::from)?;
        tx.execute(
            "UPDATE projects
             SET submissions = ?2, tasks = ?3, roadmap = ?4, admin_feedback = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                id.to_string(),
                submissions,
                tasks,
                roadmap,
                project.admin_feedback,
                project.updated_at.to_rfc3339(),
            ],
        )
        .map_err(StoreError::from)?;
        tx.commit().map_err(StoreError::from)?;

        project.refresh_progress();
        Ok((project, out))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn load_project(conn: &Connection, id: ProjectId) -> Result<Project> {
    let mut project = conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
            params![id.to_string()],
            row_to_project,
        )
        .map_err(not_found)?;
    load_relations(conn, &mut project)?;
    Ok(project)
}

fn load_relations(conn: &Connection, project: &mut Project) -> Result<()> {
    let id = project.id.to_string();

    let mut stmt = conn.prepare(
        "SELECT user_id FROM project_members WHERE project_id = ?1 ORDER BY position ASC",
    )?;
    let members = stmt.query_map(params![id], |row| uuid_at(row, 0).map(UserId))?;
    project.members = members.collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT teacher_id, status, request_date FROM supervision_requests
         WHERE project_id = ?1 ORDER BY request_date ASC",
    )?;
    let requests = stmt.query_map(params![id], |row| {
        Ok(SupervisionRequest {
            teacher_id: UserId(uuid_at(row, 0)?),
            request_status: enum_at::<RequestStatus>(row, 1)?,
            request_date: time_at(row, 2)?,
        })
    })?;
    project.supervision_requests = requests.collect::<std::result::Result<Vec<_>, _>>()?;

    project.refresh_progress();
    Ok(())
}

/// Explain why a conditional project update matched nothing.
fn conflict_for(conn: &Connection, id: ProjectId) -> Result<StoreError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM projects WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match status {
        None => StoreError::NotFound,
        Some(status) => StoreError::Conflict(format!("project is now {status}")),
    })
}

fn diagnose_assignment(
    conn: &Connection,
    id: ProjectId,
    supervisor: UserId,
    expected: ProjectStatus,
) -> Result<StoreError> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT status, supervisor_id FROM projects WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((status, current_supervisor)) = row else {
        return Ok(StoreError::NotFound);
    };
    if current_supervisor.is_some() {
        return Ok(StoreError::Conflict(
            "project already has a supervisor".to_string(),
        ));
    }
    if status != expected.as_str() {
        return Ok(StoreError::Conflict(format!("project is now {status}")));
    }

    let max: Option<Option<u32>> = conn
        .query_row(
            "SELECT max_projects FROM users WHERE id = ?1 AND role = 'supervisor'",
            params![supervisor.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(max) = max else {
        return Ok(StoreError::NotFound);
    };
    Ok(StoreError::CapacityExceeded {
        current: live_count(conn, &supervisor.to_string())?,
        limit: max.unwrap_or(DEFAULT_MAX_PROJECTS),
    })
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId(uuid_at(row, 0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        proposal_url: row.get(3)?,
        leader: UserId(uuid_at(row, 4)?),
        members: Vec::new(),
        supervisor: opt_uuid_at(row, 5)?.map(UserId),
        status: enum_at(row, 6)?,
        supervision_requests: Vec::new(),
        submissions: json_at(row, 7)?,
        tasks: json_at(row, 8)?,
        roadmap: json_at(row, 9)?,
        member_progress: Vec::new(),
        grade: opt_json_at(row, 10)?,
        admin_feedback: row.get(11)?,
        created_at: time_at(row, 12)?,
        updated_at: time_at(row, 13)?,
    })
}
