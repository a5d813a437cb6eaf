//! Domain model structs persisted in the portal database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer as JSON (camelCase on the wire).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fyp_shared::error::LifecycleError;
use fyp_shared::types::{
    DeadlineId, DeadlineScope, NotificationId, NotificationType, PhaseId, PhaseStatus, Priority,
    ProjectId, ProjectStatus, RequestStatus, Role, SubmissionId, SubmissionStatus, TaskId,
    TaskStatus, UserId,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub website: Option<String>,
}

/// A portal account. The password hash is never part of this struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub batch: Option<String>,
    pub roll_no: Option<String>,
    /// Supervisor research areas.
    pub expertise: Vec<String>,
    /// Supervisor capacity; `None` means the default.
    pub max_projects: Option<u32>,
    /// Cached count of `Ongoing` projects. Informational only.
    pub current_projects_count: u32,
    pub has_project: bool,
    pub project: Option<ProjectId>,
    pub is_leader: bool,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub social_links: SocialLinks,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Database::create_user`](crate::Database::create_user).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub department: Option<String>,
    pub batch: Option<String>,
    pub roll_no: Option<String>,
    pub expertise: Vec<String>,
    pub max_projects: Option<u32>,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub social_links: Option<SocialLinks>,
}

/// Role-specific fields only an admin may change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub department: Option<String>,
    pub batch: Option<String>,
    pub roll_no: Option<String>,
    pub expertise: Option<Vec<String>>,
    pub max_projects: Option<u32>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionRequest {
    pub teacher_id: UserId,
    pub request_status: RequestStatus,
    pub request_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub deadline_id: Option<DeadlineId>,
    pub title: String,
    pub file_url: String,
    pub status: SubmissionStatus,
    pub marks: Option<i32>,
    pub feedback: Option<String>,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub assigned_to: Option<UserId>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    pub id: PhaseId,
    pub phase: String,
    pub description: String,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberProgress {
    pub member_id: UserId,
    pub percentage: u32,
    pub tasks_done: u32,
    pub total_tasks_assigned: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub score: i32,
    pub feedback: String,
    pub graded_by: UserId,
    pub graded_at: DateTime<Utc>,
}

/// The project aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub proposal_url: Option<String>,
    pub leader: UserId,
    /// Team members in join order. Always contains the leader.
    pub members: Vec<UserId>,
    pub supervisor: Option<UserId>,
    pub status: ProjectStatus,
    pub supervision_requests: Vec<SupervisionRequest>,
    pub submissions: Vec<Submission>,
    pub tasks: Vec<Task>,
    pub roadmap: Vec<RoadmapPhase>,
    /// Derived from `tasks`; never stored.
    pub member_progress: Vec<MemberProgress>,
    pub grade: Option<Grade>,
    pub admin_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// The request addressed to `teacher`, if any.
    pub fn request_for(&self, teacher: UserId) -> Option<&SupervisionRequest> {
        self.supervision_requests
            .iter()
            .find(|r| r.teacher_id == teacher)
    }

    /// Whether `teacher` has a request in `Sent` state on this project.
    pub fn has_open_request(&self, teacher: UserId) -> bool {
        self.request_for(teacher)
            .map(|r| r.request_status == RequestStatus::Sent)
            .unwrap_or(false)
    }

    /// Recompute `member_progress` from `tasks`.
    pub fn refresh_progress(&mut self) {
        self.member_progress = member_progress(&self.members, &self.tasks);
    }
}

/// Per-member completion computed purely from the task list.
///
/// Every team member gets an entry, including those with nothing assigned
/// (0%). Tasks assigned to non-members are ignored.
pub fn member_progress(members: &[UserId], tasks: &[Task]) -> Vec<MemberProgress> {
    let mut tally: HashMap<UserId, (u32, u32)> = HashMap::new();
    for task in tasks {
        if let Some(assignee) = task.assigned_to {
            let entry = tally.entry(assignee).or_default();
            entry.1 += 1;
            if task.status == TaskStatus::Done {
                entry.0 += 1;
            }
        }
    }

    members
        .iter()
        .map(|member| {
            let (done, total) = tally.get(member).copied().unwrap_or((0, 0));
            MemberProgress {
                member_id: *member,
                percentage: if total == 0 { 0 } else { done * 100 / total },
                tasks_done: done,
                total_tasks_assigned: total,
            }
        })
        .collect()
}

/// Input for [`Database::insert_proposal`](crate::Database::insert_proposal).
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub proposal_url: Option<String>,
    pub leader: UserId,
    /// Additional members; the leader is added automatically.
    pub members: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Filter for [`Database::list_projects`](crate::Database::list_projects).
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    /// Projects the user is a team member of.
    pub member: Option<UserId>,
    /// Projects the user supervises or has received a request for.
    pub supervisor: Option<UserId>,
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub id: DeadlineId,
    pub title: String,
    pub description: String,
    pub deadline_date: DateTime<Utc>,
    pub scope: DeadlineScope,
    pub batch: Option<String>,
    pub department: Option<String>,
    pub target_project: Option<ProjectId>,
    pub created_by: Option<UserId>,
    pub is_hard_deadline: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeadline {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub deadline_date: DateTime<Utc>,
    pub scope: DeadlineScope,
    pub batch: Option<String>,
    pub department: Option<String>,
    pub target_project: Option<ProjectId>,
    #[serde(default)]
    pub is_hard_deadline: bool,
}

impl NewDeadline {
    /// Trim text fields. Blank cohort fields become `None`, and only Batch
    /// deadlines keep a cohort at all.
    pub fn normalized(self) -> Self {
        let cohort = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        let (batch, department) = match self.scope {
            DeadlineScope::Batch => (cohort(self.batch), cohort(self.department)),
            _ => (None, None),
        };
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            batch,
            department,
            ..self
        }
    }

    /// Check that the scope-dependent fields are present (and only those).
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.title.trim().is_empty() {
            return Err(LifecycleError::validation("deadline title is required"));
        }
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").is_empty();
        match self.scope {
            DeadlineScope::Global => {
                if self.target_project.is_some() {
                    return Err(LifecycleError::validation(
                        "a global deadline cannot target a project",
                    ));
                }
            }
            DeadlineScope::Batch => {
                if blank(&self.batch) || blank(&self.department) {
                    return Err(LifecycleError::validation(
                        "a batch deadline requires both batch and department",
                    ));
                }
                if self.target_project.is_some() {
                    return Err(LifecycleError::validation(
                        "a batch deadline cannot target a project",
                    ));
                }
            }
            DeadlineScope::Group => {
                if self.target_project.is_none() {
                    return Err(LifecycleError::validation(
                        "a group deadline requires a target project",
                    ));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub sender: Option<UserId>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    pub link: String,
    pub related_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient: UserId,
    pub sender: Option<UserId>,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub link: String,
    pub related_id: Option<String>,
}
