//! Project lifecycle operations.
//!
//! Each operation follows the same shape: load the project, ask
//! [`fyp_shared::lifecycle::plan`] whether the caller may perform the action
//! from the current status, check capacity where a supervisor is attached,
//! commit the change through a conditional store write, then fan out the
//! transition's notices. Any failure before the commit leaves the project
//! and the notification inbox untouched.

use chrono::Utc;
use serde::Deserialize;

use fyp_shared::lifecycle::{self, Action, Standing, Transition};
use fyp_shared::types::{ProjectId, ProjectStatus, Role, UserId};
use fyp_store::{Database, Grade, NewProject, Project, User};

use crate::error::ServerError;
use crate::fanout::{self, Event};

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// The caller's relationship to `project`.
pub fn standing(user: &User, project: &Project) -> Standing {
    Standing {
        role: user.role,
        is_leader: project.leader == user.id,
        is_member: project.is_member(user.id),
        is_assigned_supervisor: project.supervisor == Some(user.id),
        is_targeted_supervisor: project.request_for(user.id).is_some(),
    }
}

/// Team, supervisor, any supervisor the team has asked, and admins.
pub fn can_view(user: &User, project: &Project) -> bool {
    user.role == Role::Admin
        || project.is_member(user.id)
        || project.supervisor == Some(user.id)
        || project.request_for(user.id).is_some()
}

pub fn load_project(db: &Database, id: ProjectId) -> Result<Project, ServerError> {
    db.get_project(id)
        .map_err(|e| ServerError::from(e).or_not_found("Project"))
}

fn load_supervisor(db: &Database, id: UserId) -> Result<User, ServerError> {
    let user = db
        .get_user(id)
        .map_err(|e| ServerError::from(e).or_not_found("Supervisor"))?;
    if user.role != Role::Supervisor {
        return Err(ServerError::NotFound("Supervisor"));
    }
    Ok(user)
}

/// Refuse when `supervisor` has no room for another `Ongoing` project.
fn guard_capacity(db: &Database, supervisor: UserId) -> Result<(), ServerError> {
    db.supervisor_capacity(supervisor)
        .map_err(|e| ServerError::from(e).or_not_found("Supervisor"))?
        .ensure_room()?;
    Ok(())
}

/// `expected` with the transition applied, for when the committed row
/// cannot be read back.
fn settled(expected: Project, transition: &Transition) -> Project {
    Project {
        status: transition.to,
        ..expected
    }
}

/// Report a committed transition and fan out its notices.
///
/// `expected` is the project as the caller wrote it. The stored row is
/// preferred; if it cannot be read back the change has still happened, so
/// the notices go out anyway.
fn committed(
    db: &mut Database,
    actor: &User,
    expected: Project,
    transition: &Transition,
    detail: Option<String>,
    target: Option<UserId>,
) -> Project {
    let project = match db.get_project(expected.id) {
        Ok(project) => project,
        Err(e) => {
            tracing::warn!(
                error = %e,
                project = %expected.id,
                "could not reload project after commit"
            );
            settled(expected, transition)
        }
    };
    tracing::info!(
        project = %project.id,
        actor = %actor.id,
        action = ?transition.action,
        from = ?transition.from,
        to = %transition.to,
        "project transition committed"
    );

    let mut event = Event::for_project(transition.notices, &project, actor);
    if let Some(detail) = detail {
        event = event.detail(detail);
    }
    if let Some(target) = target {
        event = event.target(target);
    }
    fanout::deliver(db, &event);
    project
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub proposal_url: Option<String>,
    #[serde(default)]
    pub members: Vec<UserId>,
}

pub fn submit_proposal(
    db: &mut Database,
    actor: &User,
    input: ProposalInput,
) -> Result<Project, ServerError> {
    let transition = lifecycle::propose(actor.role, actor.has_project)?;

    let title = input.title.trim();
    if title.is_empty() {
        return Err(ServerError::BadRequest("project title is required".into()));
    }
    for member in input.members.iter().filter(|m| **m != actor.id) {
        let user = db
            .get_user(*member)
            .map_err(|e| ServerError::from(e).or_not_found("Member"))?;
        if user.role != Role::Student {
            return Err(ServerError::BadRequest(format!(
                "{} is not a student",
                user.name
            )));
        }
        if user.has_project {
            return Err(ServerError::Precondition(format!(
                "{} already belongs to a project",
                user.name
            )));
        }
    }

    let project = db.insert_proposal(&NewProject {
        title: title.to_string(),
        description: input.description.trim().to_string(),
        proposal_url: input.proposal_url.filter(|u| !u.trim().is_empty()),
        leader: actor.id,
        members: input.members,
        created_at: Utc::now(),
    })?;

    Ok(committed(db, actor, project, &transition, None, None))
}

// ---------------------------------------------------------------------------
// Admin review
// ---------------------------------------------------------------------------

pub fn approve(db: &mut Database, actor: &User, id: ProjectId) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let transition = lifecycle::plan(project.status, Action::Approve, &standing(actor, &project))?;
    db.set_status(id, project.status, transition.to)?;
    Ok(committed(db, actor, project, &transition, None, None))
}

pub fn approve_with_supervisor(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    supervisor: UserId,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let transition = lifecycle::plan(
        project.status,
        Action::ApproveWithSupervisor,
        &standing(actor, &project),
    )?;
    let supervisor = load_supervisor(db, supervisor)?;
    guard_capacity(db, supervisor.id)?;

    db.assign_supervisor(id, supervisor.id, ProjectStatus::Pending)?;
    let expected = Project {
        supervisor: Some(supervisor.id),
        ..project
    };
    Ok(committed(db, actor, expected, &transition, Some(supervisor.name), None))
}

/// Reject a pending proposal. Every member is released in the same
/// transaction, so they can propose again straight away.
pub fn reject(db: &mut Database, actor: &User, id: ProjectId) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let transition = lifecycle::plan(project.status, Action::Reject, &standing(actor, &project))?;
    let released = db.reject_proposal(id)?;
    tracing::debug!(project = %id, released, "proposal members released");
    Ok(committed(db, actor, project, &transition, None, None))
}

// ---------------------------------------------------------------------------
// Supervision
// ---------------------------------------------------------------------------

pub fn request_supervisor(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    supervisor: UserId,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let transition = lifecycle::plan(
        project.status,
        Action::RequestSupervisor,
        &standing(actor, &project),
    )?;
    let supervisor = load_supervisor(db, supervisor)?;
    guard_capacity(db, supervisor.id)?;

    db.send_request(id, supervisor.id, Utc::now())?;
    Ok(committed(db, actor, project, &transition, None, Some(supervisor.id)))
}

/// Accept or decline the caller's own pending request on `id`.
///
/// Accepting runs the same capacity-guarded assignment as an admin
/// assignment; every other pending request on the project is cancelled.
pub fn respond_to_request(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    accept: bool,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let action = if accept {
        Action::AcceptRequest
    } else {
        Action::DeclineRequest
    };
    let transition = lifecycle::plan(project.status, action, &standing(actor, &project))?;
    if !project.has_open_request(actor.id) {
        return Err(ServerError::Precondition(
            "there is no pending request for you on this project".into(),
        ));
    }

    let expected = if accept {
        guard_capacity(db, actor.id)?;
        let cancelled = db.assign_supervisor(id, actor.id, ProjectStatus::Approved)?;
        tracing::debug!(project = %id, cancelled, "sibling requests cancelled");
        Project {
            supervisor: Some(actor.id),
            ..project
        }
    } else {
        db.decline_request(id, actor.id)?;
        project
    };
    Ok(committed(db, actor, expected, &transition, None, None))
}

/// Admin assignment of a supervisor to an approved project.
///
/// Re-assigning the supervisor a project already has is a no-op: it does
/// not count against their capacity and sends no notifications.
pub fn assign_supervisor(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    supervisor: UserId,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    if actor.role == Role::Admin
        && project.supervisor == Some(supervisor)
        && project.status == ProjectStatus::Ongoing
    {
        tracing::debug!(project = %id, supervisor = %supervisor, "supervisor re-affirmed");
        return Ok(project);
    }

    let transition = lifecycle::plan(
        project.status,
        Action::AssignSupervisor,
        &standing(actor, &project),
    )?;
    let supervisor = load_supervisor(db, supervisor)?;
    guard_capacity(db, supervisor.id)?;

    db.assign_supervisor(id, supervisor.id, ProjectStatus::Approved)?;
    let expected = Project {
        supervisor: Some(supervisor.id),
        ..project
    };
    Ok(committed(db, actor, expected, &transition, Some(supervisor.name), None))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

pub fn submit_for_evaluation(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    if project.grade.is_some() {
        return Err(ServerError::Precondition(
            "the project has already been graded".into(),
        ));
    }
    let transition = lifecycle::plan(
        project.status,
        Action::SubmitForEvaluation,
        &standing(actor, &project),
    )?;
    db.set_status(id, project.status, transition.to)?;
    Ok(committed(db, actor, project, &transition, None, None))
}

pub fn request_revision(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    feedback: &str,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let transition = lifecycle::plan(
        project.status,
        Action::RequestRevision,
        &standing(actor, &project),
    )?;
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return Err(ServerError::BadRequest("revision feedback is required".into()));
    }

    db.set_status(id, project.status, transition.to)?;
    Ok(committed(db, actor, project, &transition, Some(feedback.to_string()), None))
}

/// Record the final grade. A project is graded at most once.
pub fn grade(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    score: i32,
    feedback: &str,
) -> Result<Project, ServerError> {
    let project = load_project(db, id)?;
    let transition = lifecycle::plan(project.status, Action::Grade, &standing(actor, &project))?;
    if project.grade.is_some() {
        return Err(ServerError::Precondition(
            "the project has already been graded".into(),
        ));
    }
    let feedback = lifecycle::validate_grade(score, feedback)?;

    db.set_grade(
        id,
        &Grade {
            score,
            feedback,
            graded_by: actor.id,
            graded_at: Utc::now(),
        },
    )?;
    Ok(committed(db, actor, project, &transition, Some(score.to_string()), None))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Delete an account.
///
/// Active projects the account supervises take the `RemoveSupervisor`
/// transition in the same store transaction as the deletion; their teams
/// are told once it has committed. Callers check the caller is an admin
/// deleting someone else.
pub fn delete_user(db: &mut Database, actor: &User, id: UserId) -> Result<(), ServerError> {
    let user = db
        .get_user(id)
        .map_err(|e| ServerError::from(e).or_not_found("User"))?;

    let mut reopened = Vec::new();
    if user.role == Role::Supervisor {
        for project_id in db.supervised_project_ids(id)? {
            let project = load_project(db, project_id)?;
            if lifecycle::rule(project.status, Action::RemoveSupervisor).is_none() {
                continue;
            }
            let transition = lifecycle::plan(
                project.status,
                Action::RemoveSupervisor,
                &standing(actor, &project),
            )?;
            reopened.push((project, transition));
        }
    }

    let reopen: Vec<_> = reopened.iter().map(|(p, t)| (p.id, t.to)).collect();
    if !db.delete_user(id, &reopen)? {
        return Err(ServerError::NotFound("User"));
    }

    for (project, transition) in reopened {
        let expected = Project {
            supervisor: None,
            ..project
        };
        committed(db, actor, expected, &transition, Some(user.name.clone()), None);
    }
    Ok(())
}
