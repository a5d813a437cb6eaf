//! Notification catalog and recipient rules.
//!
//! A [`Notice`] is a template: who receives it, what type it carries and
//! how its title and message read. Lifecycle transitions and the other
//! portal events reference these constants, so the text of every message
//! lives here and nowhere else.

use std::collections::HashSet;

use crate::types::{NotificationType, UserId};

/// Who receives a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Leader plus members, deduplicated, minus the actor.
    Team,
    /// The supervisor a request is addressed to.
    TargetSupervisor,
    /// The supervisor currently assigned to the project.
    AssignedSupervisor,
    /// Every admin account.
    Admins,
    /// The user a task is assigned to.
    Assignee,
    /// Students a deadline applies to.
    ScopedStudents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub kind: NotificationType,
    pub audience: Audience,
    pub title: &'static str,
    /// Message template. `{project}`, `{actor}` and `{detail}` are
    /// substituted at render time.
    pub message: &'static str,
}

/// Values substituted into a notice template.
#[derive(Debug, Clone, Default)]
pub struct NoticeContext<'a> {
    pub project: &'a str,
    pub actor: &'a str,
    pub detail: Option<&'a str>,
}

impl Notice {
    /// Render `(title, message)` for this notice.
    ///
    /// The template is scanned once, so braces inside substituted values
    /// are copied through untouched.
    pub fn render(&self, ctx: &NoticeContext<'_>) -> (String, String) {
        let mut message = String::with_capacity(self.message.len() + ctx.project.len());
        let mut rest = self.message;
        while let Some(start) = rest.find('{') {
            message.push_str(&rest[..start]);
            let tail = &rest[start..];
            let (value, len) = if tail.starts_with("{project}") {
                (ctx.project, "{project}".len())
            } else if tail.starts_with("{actor}") {
                (ctx.actor, "{actor}".len())
            } else if tail.starts_with("{detail}") {
                (ctx.detail.unwrap_or(""), "{detail}".len())
            } else {
                ("{", 1)
            };
            message.push_str(value);
            rest = &tail[len..];
        }
        message.push_str(rest);
        (self.title.to_string(), message.trim_end().to_string())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub const PROPOSAL_SUBMITTED: Notice = Notice {
    kind: NotificationType::Proposal,
    audience: Audience::Admins,
    title: "New project proposal",
    message: "{actor} submitted the proposal \"{project}\" for review.",
};

pub const PROPOSAL_APPROVED: Notice = Notice {
    kind: NotificationType::Approval,
    audience: Audience::Team,
    title: "Proposal approved",
    message: "Your proposal \"{project}\" was approved. You can now request a supervisor.",
};

pub const PROPOSAL_APPROVED_WITH_SUPERVISOR: Notice = Notice {
    kind: NotificationType::Approval,
    audience: Audience::Team,
    title: "Proposal approved",
    message: "Your proposal \"{project}\" was approved and {detail} was assigned as supervisor.",
};

pub const PROPOSAL_REJECTED: Notice = Notice {
    kind: NotificationType::Rejection,
    audience: Audience::Team,
    title: "Proposal rejected",
    message: "Your proposal \"{project}\" was rejected. You may submit a new proposal.",
};

pub const SUPERVISOR_ASSIGNED_TEAM: Notice = Notice {
    kind: NotificationType::Assignment,
    audience: Audience::Team,
    title: "Supervisor assigned",
    message: "{detail} was assigned as supervisor of \"{project}\".",
};

pub const SUPERVISOR_REMOVED: Notice = Notice {
    kind: NotificationType::Assignment,
    audience: Audience::Team,
    title: "Supervisor removed",
    message: "{detail} no longer supervises \"{project}\". Request a new supervisor to continue.",
};

pub const SUPERVISOR_ASSIGNED: Notice = Notice {
    kind: NotificationType::Assignment,
    audience: Audience::AssignedSupervisor,
    title: "New project assigned",
    message: "You were assigned to supervise \"{project}\".",
};

pub const SUPERVISION_REQUESTED: Notice = Notice {
    kind: NotificationType::Request,
    audience: Audience::TargetSupervisor,
    title: "Supervision request",
    message: "{actor} asked you to supervise \"{project}\".",
};

pub const REQUEST_ACCEPTED: Notice = Notice {
    kind: NotificationType::Request,
    audience: Audience::Team,
    title: "Supervision request accepted",
    message: "{actor} accepted your request and now supervises \"{project}\".",
};

pub const REQUEST_DECLINED: Notice = Notice {
    kind: NotificationType::Request,
    audience: Audience::Team,
    title: "Supervision request declined",
    message: "{actor} declined to supervise \"{project}\".",
};

pub const SUBMITTED_FOR_EVALUATION: Notice = Notice {
    kind: NotificationType::Evaluation,
    audience: Audience::AssignedSupervisor,
    title: "Project ready for evaluation",
    message: "\"{project}\" was submitted for final evaluation by {actor}.",
};

pub const REVISION_REQUESTED: Notice = Notice {
    kind: NotificationType::Revision,
    audience: Audience::Team,
    title: "Revision requested",
    message: "{actor} requested a revision of \"{project}\": {detail}",
};

pub const PROJECT_GRADED: Notice = Notice {
    kind: NotificationType::Grade,
    audience: Audience::Team,
    title: "Project graded",
    message: "\"{project}\" was graded {detail}/100 by {actor}.",
};

pub const DELIVERABLE_UPLOADED_TEAM: Notice = Notice {
    kind: NotificationType::Submission,
    audience: Audience::Team,
    title: "New deliverable uploaded",
    message: "{actor} uploaded \"{detail}\" to \"{project}\".",
};

pub const DELIVERABLE_UPLOADED: Notice = Notice {
    kind: NotificationType::Submission,
    audience: Audience::AssignedSupervisor,
    title: "New deliverable to review",
    message: "{actor} uploaded \"{detail}\" to \"{project}\".",
};

pub const SUBMISSION_REVIEWED: Notice = Notice {
    kind: NotificationType::Feedback,
    audience: Audience::Team,
    title: "Submission reviewed",
    message: "{actor} reviewed \"{detail}\" in \"{project}\".",
};

pub const TASK_ASSIGNED: Notice = Notice {
    kind: NotificationType::Task,
    audience: Audience::Assignee,
    title: "Task assigned",
    message: "{actor} assigned you \"{detail}\" in \"{project}\".",
};

pub const ADMIN_FEEDBACK: Notice = Notice {
    kind: NotificationType::Feedback,
    audience: Audience::Team,
    title: "Feedback from administration",
    message: "New admin feedback on \"{project}\": {detail}",
};

pub const DEADLINE_CREATED: Notice = Notice {
    kind: NotificationType::Deadline,
    audience: Audience::ScopedStudents,
    title: "New deadline",
    message: "{actor} set a deadline: {detail}",
};

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

/// Everyone who could be addressed by a notice for one event.
#[derive(Debug, Clone, Default)]
pub struct Parties<'a> {
    pub actor: Option<UserId>,
    pub leader: Option<UserId>,
    pub members: &'a [UserId],
    pub target_supervisor: Option<UserId>,
    pub assigned_supervisor: Option<UserId>,
    pub admins: &'a [UserId],
    pub assignee: Option<UserId>,
    pub scoped_students: &'a [UserId],
}

/// Resolve the recipient list for `audience`.
///
/// The result is deduplicated, keeps first-seen order, and never contains
/// the actor: nobody is notified about their own action.
pub fn recipients(audience: Audience, parties: &Parties<'_>) -> Vec<UserId> {
    let candidates: Vec<UserId> = match audience {
        Audience::Team => parties
            .leader
            .into_iter()
            .chain(parties.members.iter().copied())
            .collect(),
        Audience::TargetSupervisor => parties.target_supervisor.into_iter().collect(),
        Audience::AssignedSupervisor => parties.assigned_supervisor.into_iter().collect(),
        Audience::Admins => parties.admins.to_vec(),
        Audience::Assignee => parties.assignee.into_iter().collect(),
        Audience::ScopedStudents => parties.scoped_students.to_vec(),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|id| Some(*id) != parties.actor)
        .filter(|id| seen.insert(*id))
        .collect()
}
