//! Notification fan-out.
//!
//! Runs after the state change it reports has committed, in its own
//! transaction. A failure here is logged and swallowed: the caller's
//! operation has already succeeded and must not be reported as failed.

use fyp_shared::notice::{recipients, Audience, Notice, NoticeContext, Parties};
use fyp_shared::types::{Role, UserId};
use fyp_store::{Database, Deadline, NewNotification, Project, User};

/// One portal event and everything needed to address its notices.
#[derive(Debug, Clone)]
pub struct Event {
    pub notices: &'static [Notice],
    pub actor: UserId,
    pub actor_name: String,
    pub subject: String,
    pub detail: Option<String>,
    pub leader: Option<UserId>,
    pub members: Vec<UserId>,
    pub target_supervisor: Option<UserId>,
    pub assigned_supervisor: Option<UserId>,
    pub assignee: Option<UserId>,
    pub scoped_students: Vec<UserId>,
    pub link: String,
    pub related_id: Option<String>,
}

impl Event {
    /// An event about `project`, addressed relative to its current team and
    /// supervisor.
    pub fn for_project(notices: &'static [Notice], project: &Project, actor: &User) -> Self {
        Self {
            notices,
            actor: actor.id,
            actor_name: actor.name.clone(),
            subject: project.title.clone(),
            detail: None,
            leader: Some(project.leader),
            members: project.members.clone(),
            target_supervisor: None,
            assigned_supervisor: project.supervisor,
            assignee: None,
            scoped_students: Vec::new(),
            link: format!("/projects/{}", project.id),
            related_id: Some(project.id.to_string()),
        }
    }

    /// A deadline announcement for the students it applies to.
    pub fn for_deadline(
        notices: &'static [Notice],
        deadline: &Deadline,
        actor: &User,
        students: Vec<UserId>,
    ) -> Self {
        Self {
            notices,
            actor: actor.id,
            actor_name: actor.name.clone(),
            subject: deadline.title.clone(),
            detail: Some(format!(
                "{} (due {})",
                deadline.title,
                deadline.deadline_date.format("%Y-%m-%d %H:%M UTC")
            )),
            leader: None,
            members: Vec::new(),
            target_supervisor: None,
            assigned_supervisor: None,
            assignee: None,
            scoped_students: students,
            link: "/deadlines".to_string(),
            related_id: Some(deadline.id.to_string()),
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn target(mut self, supervisor: UserId) -> Self {
        self.target_supervisor = Some(supervisor);
        self
    }

    pub fn assignee(mut self, user: UserId) -> Self {
        self.assignee = Some(user);
        self
    }

    fn needs_admins(&self) -> bool {
        self.notices.iter().any(|n| n.audience == Audience::Admins)
    }

    /// Render one notification per recipient per notice.
    pub fn render(&self, admins: &[UserId]) -> Vec<NewNotification> {
        let parties = Parties {
            actor: Some(self.actor),
            leader: self.leader,
            members: &self.members,
            target_supervisor: self.target_supervisor,
            assigned_supervisor: self.assigned_supervisor,
            admins,
            assignee: self.assignee,
            scoped_students: &self.scoped_students,
        };
        let ctx = NoticeContext {
            project: &self.subject,
            actor: &self.actor_name,
            detail: self.detail.as_deref(),
        };

        let mut batch = Vec::new();
        for notice in self.notices {
            let (title, message) = notice.render(&ctx);
            for recipient in recipients(notice.audience, &parties) {
                batch.push(NewNotification {
                    recipient,
                    sender: Some(self.actor),
                    title: title.clone(),
                    message: message.clone(),
                    kind: notice.kind,
                    link: self.link.clone(),
                    related_id: self.related_id.clone(),
                });
            }
        }
        batch
    }
}

/// Deliver `event`. Returns how many notifications were stored.
pub fn deliver(db: &mut Database, event: &Event) -> usize {
    let admins = if event.needs_admins() {
        match db.user_ids_with_role(Role::Admin) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, subject = %event.subject, "could not resolve admins for fan-out");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let batch = event.render(&admins);
    if batch.is_empty() {
        return 0;
    }

    match db.insert_notifications(&batch) {
        Ok(stored) => {
            tracing::debug!(subject = %event.subject, count = stored.len(), "notifications delivered");
            stored.len()
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                subject = %event.subject,
                count = batch.len(),
                "notification fan-out failed"
            );
            0
        }
    }
}
