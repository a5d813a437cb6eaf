//! Day-to-day project work: tasks, roadmap phases, deliverables, reviews
//! and admin feedback.
//!
//! None of these change the project status. Each one is a single
//! read-modify-write through [`Database::update_work`], with the access and
//! status checks made against the freshly loaded project inside that
//! transaction.

use chrono::Utc;
use serde::Deserialize;

use fyp_shared::lifecycle::validate_score;
use fyp_shared::notice;
use fyp_shared::types::{
    DeadlineId, DeadlineScope, PhaseId, PhaseStatus, Priority, ProjectId, ProjectStatus, Role,
    SubmissionId, SubmissionStatus, TaskId, TaskStatus, UserId,
};
use fyp_store::{Database, Project, RoadmapPhase, Submission, Task, User};

use crate::error::ServerError;
use crate::fanout::{self, Event};

/// Statuses in which the team is still working on the project.
fn is_active(status: ProjectStatus) -> bool {
    matches!(
        status,
        ProjectStatus::Approved
            | ProjectStatus::Ongoing
            | ProjectStatus::PendingEvaluation
            | ProjectStatus::RevisionRequested
    )
}

/// Team members and the assigned supervisor may edit tasks and roadmap.
fn ensure_worker(actor: &User, project: &Project) -> Result<(), ServerError> {
    if !(project.is_member(actor.id) || project.supervisor == Some(actor.id)) {
        return Err(ServerError::Forbidden(
            "only the team or its supervisor may change project work".into(),
        ));
    }
    if !is_active(project.status) {
        return Err(ServerError::Precondition(format!(
            "the project is {} and cannot be worked on",
            project.status
        )));
    }
    Ok(())
}

fn ensure_assignable(project: &Project, assignee: Option<UserId>) -> Result<(), ServerError> {
    match assignee {
        Some(id) if !project.is_member(id) => Err(ServerError::BadRequest(
            "tasks can only be assigned to team members".into(),
        )),
        _ => Ok(()),
    }
}

fn required(value: &str, what: &str) -> Result<String, ServerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServerError::BadRequest(format!("{what} is required")));
    }
    Ok(value.to_string())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub feedback: Option<String>,
    pub assigned_to: Option<UserId>,
}

pub fn add_task(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    input: NewTask,
) -> Result<Project, ServerError> {
    let (project, task) = db.update_work(id, |project| {
        ensure_worker(actor, project)?;
        ensure_assignable(project, input.assigned_to)?;
        let task = Task {
            id: TaskId::new(),
            title: required(&input.title, "task title")?,
            assigned_to: input.assigned_to,
            status: TaskStatus::ToDo,
            priority: input.priority,
            feedback: String::new(),
        };
        project.tasks.push(task.clone());
        Ok::<_, ServerError>(task)
    })?;

    tracing::debug!(project = %id, task = %task.id, "task added");
    if let Some(assignee) = task.assigned_to {
        let event = Event::for_project(&[notice::TASK_ASSIGNED], &project, actor)
            .assignee(assignee)
            .detail(task.title);
        fanout::deliver(db, &event);
    }
    Ok(project)
}

pub fn update_task(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    task_id: TaskId,
    update: TaskUpdate,
) -> Result<Project, ServerError> {
    let (project, reassigned) = db.update_work(id, |project| {
        ensure_worker(actor, project)?;
        ensure_assignable(project, update.assigned_to)?;
        let task = project
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(ServerError::NotFound("Task"))?;

        if let Some(title) = &update.title {
            task.title = required(title, "task title")?;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(feedback) = &update.feedback {
            task.feedback = feedback.trim().to_string();
        }
        let mut reassigned = None;
        if update.assigned_to.is_some() && update.assigned_to != task.assigned_to {
            task.assigned_to = update.assigned_to;
            reassigned = update.assigned_to.map(|a| (a, task.title.clone()));
        }
        Ok::<_, ServerError>(reassigned)
    })?;

    if let Some((assignee, title)) = reassigned {
        let event = Event::for_project(&[notice::TASK_ASSIGNED], &project, actor)
            .assignee(assignee)
            .detail(title);
        fanout::deliver(db, &event);
    }
    Ok(project)
}

// ---------------------------------------------------------------------------
// Roadmap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhase {
    pub phase: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseUpdate {
    pub status: Option<PhaseStatus>,
    pub description: Option<String>,
}

pub fn add_phase(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    input: NewPhase,
) -> Result<Project, ServerError> {
    let (project, ()) = db.update_work(id, |project| {
        ensure_worker(actor, project)?;
        project.roadmap.push(RoadmapPhase {
            id: PhaseId::new(),
            phase: required(&input.phase, "phase name")?,
            description: input.description.trim().to_string(),
            status: PhaseStatus::Pending,
        });
        Ok::<_, ServerError>(())
    })?;
    Ok(project)
}

pub fn update_phase(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    phase_id: PhaseId,
    update: PhaseUpdate,
) -> Result<Project, ServerError> {
    let (project, ()) = db.update_work(id, |project| {
        ensure_worker(actor, project)?;
        let phase = project
            .roadmap
            .iter_mut()
            .find(|p| p.id == phase_id)
            .ok_or(ServerError::NotFound("Roadmap phase"))?;
        if let Some(status) = update.status {
            phase.status = status;
        }
        if let Some(description) = &update.description {
            phase.description = description.trim().to_string();
        }
        Ok::<_, ServerError>(())
    })?;
    Ok(project)
}

// ---------------------------------------------------------------------------
// Deliverables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub title: String,
    pub file_url: String,
    pub deadline_id: Option<DeadlineId>,
}

/// Check that an upload may be attached to `project` before the file is
/// stored. The same checks run again inside the write.
pub fn check_uploader(db: &Database, actor: &User, id: ProjectId) -> Result<(), ServerError> {
    let project = crate::workflow::load_project(db, id)?;
    ensure_uploader(actor, &project)
}

fn ensure_uploader(actor: &User, project: &Project) -> Result<(), ServerError> {
    if !project.is_member(actor.id) {
        return Err(ServerError::Forbidden(
            "only team members may upload deliverables".into(),
        ));
    }
    if !project.status.accepts_submissions() {
        return Err(ServerError::Precondition(format!(
            "deliverables cannot be uploaded while the project is {}",
            project.status
        )));
    }
    Ok(())
}

/// Attach an uploaded deliverable. A resubmission during a revision is
/// just another deliverable; the status stays until the project is graded.
pub fn add_submission(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    input: NewSubmission,
) -> Result<(Project, Submission), ServerError> {
    if let Some(deadline_id) = input.deadline_id {
        let deadline = db
            .get_deadline(deadline_id)
            .map_err(|e| ServerError::from(e).or_not_found("Deadline"))?;
        if deadline.scope == DeadlineScope::Group && deadline.target_project != Some(id) {
            return Err(ServerError::BadRequest(
                "that deadline belongs to another project".into(),
            ));
        }
    }

    let (project, submission) = db.update_work(id, |project| {
        ensure_uploader(actor, project)?;
        let submission = Submission {
            id: SubmissionId::new(),
            deadline_id: input.deadline_id,
            title: required(&input.title, "submission title")?,
            file_url: input.file_url,
            status: SubmissionStatus::Submitted,
            marks: None,
            feedback: None,
            submitted_by: actor.id,
            submitted_at: Utc::now(),
        };
        project.submissions.push(submission.clone());
        Ok::<_, ServerError>(submission)
    })?;

    tracing::info!(project = %id, submission = %submission.id, uploader = %actor.id, "deliverable uploaded");
    let event = Event::for_project(
        &[notice::DELIVERABLE_UPLOADED_TEAM, notice::DELIVERABLE_UPLOADED],
        &project,
        actor,
    )
    .detail(submission.title.clone());
    fanout::deliver(db, &event);
    Ok((project, submission))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub marks: Option<i32>,
    pub feedback: Option<String>,
    pub status: Option<SubmissionStatus>,
}

pub fn review_submission(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    submission_id: SubmissionId,
    review: Review,
) -> Result<Project, ServerError> {
    if let Some(marks) = review.marks {
        validate_score(marks)?;
    }
    let status = review.status.unwrap_or(SubmissionStatus::Reviewed);
    if status == SubmissionStatus::Submitted {
        return Err(ServerError::BadRequest(
            "a review must mark the submission reviewed or request changes".into(),
        ));
    }

    let (project, title) = db.update_work(id, |project| {
        if project.supervisor != Some(actor.id) {
            return Err(ServerError::Forbidden(
                "only the assigned supervisor may review deliverables".into(),
            ));
        }
        let submission = project
            .submissions
            .iter_mut()
            .find(|s| s.id == submission_id)
            .ok_or(ServerError::NotFound("Submission"))?;
        submission.status = status;
        if review.marks.is_some() {
            submission.marks = review.marks;
        }
        if let Some(feedback) = &review.feedback {
            submission.feedback = Some(feedback.trim().to_string());
        }
        Ok::<_, ServerError>(submission.title.clone())
    })?;

    let event = Event::for_project(&[notice::SUBMISSION_REVIEWED], &project, actor).detail(title);
    fanout::deliver(db, &event);
    Ok(project)
}

// ---------------------------------------------------------------------------
// Admin feedback
// ---------------------------------------------------------------------------

pub fn set_admin_feedback(
    db: &mut Database,
    actor: &User,
    id: ProjectId,
    feedback: &str,
) -> Result<Project, ServerError> {
    if actor.role != Role::Admin {
        return Err(ServerError::Forbidden(
            "only admins may leave admin feedback".into(),
        ));
    }
    let feedback = required(feedback, "feedback")?;

    let (project, ()) = db.update_work(id, |project| {
        project.admin_feedback = Some(feedback.clone());
        Ok::<_, ServerError>(())
    })?;

    let event = Event::for_project(&[notice::ADMIN_FEEDBACK], &project, actor).detail(feedback);
    fanout::deliver(db, &event);
    Ok(project)
}

#[cfg(test)]
mod tests {
    use fyp_shared::types::NotificationType;

    use super::*;
    use crate::testing::{inbox, open, proposal, supervisor, user};
    use crate::workflow;

    struct Team {
        admin: User,
        leader: User,
        member: User,
        sup: User,
        project: Project,
    }

    fn ongoing(db: &mut Database) -> Team {
        let admin = user(db, "Admin", Role::Admin);
        let sup = supervisor(db, "Dr Work", 3);
        let leader = user(db, "Leader", Role::Student);
        let member = user(db, "Member", Role::Student);
        let project = proposal(db, &leader, &[&member]);
        let project = workflow::approve_with_supervisor(db, &admin, project.id, sup.id).unwrap();
        Team {
            admin,
            leader: db.get_user(leader.id).unwrap(),
            member: db.get_user(member.id).unwrap(),
            sup,
            project,
        }
    }

    fn count(db: &Database, id: UserId, kind: NotificationType) -> usize {
        inbox(db, id).into_iter().filter(|n| n.kind == kind).count()
    }

    #[test]
    fn test_tasks_drive_member_progress() {
        let (mut db, _dir) = open();
        let t = ongoing(&mut db);

        let project = add_task(
            &mut db,
            &t.leader,
            t.project.id,
            NewTask {
                title: "Dataset collection".into(),
                assigned_to: Some(t.member.id),
                priority: Priority::High,
            },
        )
        .unwrap();
        let task_id = project.tasks[0].id;
        assert_eq!(count(&db, t.member.id, NotificationType::Task), 1);

        let project = update_task(
            &mut db,
            &t.member,
            t.project.id,
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
        )
        .unwrap();
        let progress = project
            .member_progress
            .iter()
            .find(|p| p.member_id == t.member.id)
            .unwrap();
        assert_eq!(progress.percentage, 100);
        assert_eq!(progress.tasks_done, 1);
    }

    #[test]
    fn test_task_assignee_must_be_member() {
        let (mut db, _dir) = open();
        let t = ongoing(&mut db);
        let err = add_task(
            &mut db,
            &t.leader,
            t.project.id,
            NewTask {
                title: "Outsourced".into(),
                assigned_to: Some(t.admin.id),
                priority: Priority::Low,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
        assert!(db.get_project(t.project.id).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_outsider_cannot_edit_work() {
        let (mut db, _dir) = open();
        let t = ongoing(&mut db);
        let outsider = user(&db, "Outsider", Role::Student);
        let err = add_phase(
            &mut db,
            &outsider,
            t.project.id,
            NewPhase {
                phase: "Design".into(),
                description: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));
    }

    #[test]
    fn test_roadmap_phases() {
        let (mut db, _dir) = open();
        let t = ongoing(&mut db);
        let project = add_phase(
            &mut db,
            &t.sup,
            t.project.id,
            NewPhase {
                phase: "Literature review".into(),
                description: "Survey prior work".into(),
            },
        )
        .unwrap();
        assert_eq!(project.roadmap[0].status, PhaseStatus::Pending);

        let project = update_phase(
            &mut db,
            &t.leader,
            t.project.id,
            project.roadmap[0].id,
            PhaseUpdate {
                status: Some(PhaseStatus::Completed),
                description: None,
            },
        )
        .unwrap();
        assert_eq!(project.roadmap[0].status, PhaseStatus::Completed);
        assert_eq!(project.roadmap[0].description, "Survey prior work");
    }

    #[test]
    fn test_submission_and_review() {
        let (mut db, _dir) = open();
        let t = ongoing(&mut db);

        let (_, submission) = add_submission(
            &mut db,
            &t.member,
            t.project.id,
            NewSubmission {
                title: "SRS document".into(),
                file_url: "http://localhost:8080/files/x".into(),
                deadline_id: None,
            },
        )
        .unwrap();
        assert_eq!(submission.status, SubmissionStatus::Submitted);
        assert_eq!(count(&db, t.sup.id, NotificationType::Submission), 1);
        assert_eq!(count(&db, t.leader.id, NotificationType::Submission), 1);
        assert_eq!(count(&db, t.member.id, NotificationType::Submission), 0);

        assert!(matches!(
            review_submission(
                &mut db,
                &t.sup,
                t.project.id,
                submission.id,
                Review {
                    marks: Some(101),
                    ..Default::default()
                },
            ),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            review_submission(&mut db, &t.leader, t.project.id, submission.id, Review::default()),
            Err(ServerError::Forbidden(_))
        ));

        let project = review_submission(
            &mut db,
            &t.sup,
            t.project.id,
            submission.id,
            Review {
                marks: Some(18),
                feedback: Some("Add use-case diagrams".into()),
                status: Some(SubmissionStatus::ChangesRequested),
            },
        )
        .unwrap();
        let reviewed = &project.submissions[0];
        assert_eq!(reviewed.marks, Some(18));
        assert_eq!(reviewed.status, SubmissionStatus::ChangesRequested);
        assert_eq!(count(&db, t.member.id, NotificationType::Feedback), 1);
    }

    #[test]
    fn test_no_uploads_before_supervision() {
        let (mut db, _dir) = open();
        let admin = user(&db, "Admin", Role::Admin);
        let leader = user(&db, "Leader", Role::Student);
        let project = proposal(&mut db, &leader, &[]);
        workflow::approve(&mut db, &admin, project.id).unwrap();
        let leader = db.get_user(leader.id).unwrap();

        assert!(matches!(
            check_uploader(&db, &leader, project.id),
            Err(ServerError::Precondition(_))
        ));
    }

    #[test]
    fn test_admin_feedback() {
        let (mut db, _dir) = open();
        let t = ongoing(&mut db);
        assert!(matches!(
            set_admin_feedback(&mut db, &t.sup, t.project.id, "hi"),
            Err(ServerError::Forbidden(_))
        ));
        let project = set_admin_feedback(&mut db, &t.admin, t.project.id, " Fix title ").unwrap();
        assert_eq!(project.admin_feedback.as_deref(), Some("Fix title"));
        assert_eq!(count(&db, t.leader.id, NotificationType::Feedback), 1);
    }
}
