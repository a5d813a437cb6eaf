//! Project lifecycle transition table.
//!
//! Every status change a project can go through is listed in [`rule`]. The
//! table is keyed on `(current status, action)`; each action has exactly
//! one kind of actor allowed to perform it ([`Action::actor`]). Callers ask
//! [`plan`] for a [`Transition`] before touching any state: on `Ok` they
//! apply `transition.to` and emit `transition.notices`, on `Err` they stop.
//!
//! ```text
//! Pending ──approve──────────────▶ Approved ──accept request──▶ Ongoing
//!    │    ──approve + supervisor──────────────────────────────▶ Ongoing
//!    └────reject──▶ Rejected        │ ──assign supervisor─────▶ Ongoing
//!                                   └─request / decline──▶ Approved
//! Ongoing ──submit for evaluation──▶ Pending Evaluation
//! Pending Evaluation ──request revision──▶ Revision Requested
//! Pending Evaluation | Revision Requested ──grade──▶ Completed
//! Ongoing | Pending Evaluation | Revision Requested ──remove supervisor──▶ Approved
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SCORE, MIN_SCORE};
use crate::error::LifecycleError;
use crate::notice::{self, Notice};
use crate::types::{ProjectStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Approve,
    ApproveWithSupervisor,
    Reject,
    RequestSupervisor,
    AcceptRequest,
    DeclineRequest,
    AssignSupervisor,
    SubmitForEvaluation,
    RequestRevision,
    Grade,
    /// The assigned supervisor's account was deleted.
    RemoveSupervisor,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Approve,
        Action::ApproveWithSupervisor,
        Action::Reject,
        Action::RequestSupervisor,
        Action::AcceptRequest,
        Action::DeclineRequest,
        Action::AssignSupervisor,
        Action::SubmitForEvaluation,
        Action::RequestRevision,
        Action::Grade,
        Action::RemoveSupervisor,
    ];

    /// The only kind of actor allowed to perform this action.
    pub fn actor(&self) -> Actor {
        match self {
            Action::Approve
            | Action::ApproveWithSupervisor
            | Action::Reject
            | Action::AssignSupervisor
            | Action::RemoveSupervisor => Actor::Admin,
            Action::RequestSupervisor => Actor::TeamMember,
            Action::AcceptRequest | Action::DeclineRequest => Actor::TargetedSupervisor,
            Action::SubmitForEvaluation => Actor::Leader,
            Action::RequestRevision | Action::Grade => Actor::AssignedSupervisor,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Approve | Action::ApproveWithSupervisor => "approve",
            Action::Reject => "reject",
            Action::RequestSupervisor => "request a supervisor for",
            Action::AcceptRequest => "accept supervision of",
            Action::DeclineRequest => "decline supervision of",
            Action::AssignSupervisor => "assign a supervisor to",
            Action::SubmitForEvaluation => "submit for evaluation",
            Action::RequestRevision => "request a revision of",
            Action::Grade => "grade",
            Action::RemoveSupervisor => "remove the supervisor of",
        }
    }
}

/// The relationship an actor must have with the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    /// A student who is the leader or a member.
    TeamMember,
    Leader,
    /// A supervisor with an open request addressed to them.
    TargetedSupervisor,
    AssignedSupervisor,
}

impl Actor {
    fn describe(&self) -> &'static str {
        match self {
            Actor::Admin => "an admin",
            Actor::TeamMember => "a member of the project team",
            Actor::Leader => "the project leader",
            Actor::TargetedSupervisor => "the supervisor the request was sent to",
            Actor::AssignedSupervisor => "the assigned supervisor",
        }
    }
}

/// What the current user is, relative to one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub role: Role,
    pub is_leader: bool,
    pub is_member: bool,
    pub is_assigned_supervisor: bool,
    pub is_targeted_supervisor: bool,
}

impl Standing {
    /// A user with no relationship to the project.
    pub fn outsider(role: Role) -> Self {
        Self {
            role,
            is_leader: false,
            is_member: false,
            is_assigned_supervisor: false,
            is_targeted_supervisor: false,
        }
    }

    pub fn satisfies(&self, actor: Actor) -> bool {
        match actor {
            Actor::Admin => self.role == Role::Admin,
            Actor::TeamMember => self.role == Role::Student && (self.is_leader || self.is_member),
            Actor::Leader => self.role == Role::Student && self.is_leader,
            Actor::TargetedSupervisor => {
                self.role == Role::Supervisor && self.is_targeted_supervisor
            }
            Actor::AssignedSupervisor => {
                self.role == Role::Supervisor && self.is_assigned_supervisor
            }
        }
    }
}

/// Row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub next: ProjectStatus,
    pub notices: &'static [Notice],
}

/// A checked, not yet applied, status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// `None` for proposal submission.
    pub action: Option<Action>,
    pub from: Option<ProjectStatus>,
    pub to: ProjectStatus,
    pub notices: &'static [Notice],
}

impl Transition {
    pub fn changes_status(&self) -> bool {
        self.from != Some(self.to)
    }
}

/// The transition table. `None` means the action is illegal from `from`.
pub fn rule(from: ProjectStatus, action: Action) -> Option<Rule> {
    use Action::*;
    use ProjectStatus::*;

    let (next, notices): (ProjectStatus, &'static [Notice]) = match (from, action) {
        (Pending, Approve) => (Approved, &[notice::PROPOSAL_APPROVED]),
        (Pending, ApproveWithSupervisor) => (
            Ongoing,
            &[
                notice::PROPOSAL_APPROVED_WITH_SUPERVISOR,
                notice::SUPERVISOR_ASSIGNED,
            ],
        ),
        (Pending, Reject) => (Rejected, &[notice::PROPOSAL_REJECTED]),
        (Approved, RequestSupervisor) => (Approved, &[notice::SUPERVISION_REQUESTED]),
        (Approved, AcceptRequest) => (Ongoing, &[notice::REQUEST_ACCEPTED]),
        (Approved, DeclineRequest) => (Approved, &[notice::REQUEST_DECLINED]),
        (Approved, AssignSupervisor) => (
            Ongoing,
            &[notice::SUPERVISOR_ASSIGNED_TEAM, notice::SUPERVISOR_ASSIGNED],
        ),
        (Ongoing, SubmitForEvaluation) => {
            (PendingEvaluation, &[notice::SUBMITTED_FOR_EVALUATION])
        }
        (PendingEvaluation, RequestRevision) => {
            (RevisionRequested, &[notice::REVISION_REQUESTED])
        }
        (PendingEvaluation, Grade) | (RevisionRequested, Grade) => {
            (Completed, &[notice::PROJECT_GRADED])
        }
        (Ongoing, RemoveSupervisor)
        | (PendingEvaluation, RemoveSupervisor)
        | (RevisionRequested, RemoveSupervisor) => (Approved, &[notice::SUPERVISOR_REMOVED]),
        _ => return None,
    };

    Some(Rule { next, notices })
}

/// Check that `standing` may perform `action` on a project in `from`.
///
/// Authorization is checked before state, so a student trying to grade is
/// told they are not allowed even if the project is not gradable either.
pub fn plan(
    from: ProjectStatus,
    action: Action,
    standing: &Standing,
) -> Result<Transition, LifecycleError> {
    let actor = action.actor();
    if !standing.satisfies(actor) {
        return Err(LifecycleError::forbidden(format!(
            "only {} may {} this project",
            actor.describe(),
            action.verb()
        )));
    }

    let rule = rule(from, action).ok_or_else(|| refusal(from, action))?;

    Ok(Transition {
        action: Some(action),
        from: Some(from),
        to: rule.next,
        notices: rule.notices,
    })
}

/// Proposal submission, the only way a project comes into existence.
pub fn propose(role: Role, already_in_project: bool) -> Result<Transition, LifecycleError> {
    if role != Role::Student {
        return Err(LifecycleError::forbidden("only students may submit proposals"));
    }
    if already_in_project {
        return Err(LifecycleError::precondition(
            "you already belong to an active project",
        ));
    }
    Ok(Transition {
        action: None,
        from: None,
        to: ProjectStatus::Pending,
        notices: &[notice::PROPOSAL_SUBMITTED],
    })
}

fn refusal(from: ProjectStatus, action: Action) -> LifecycleError {
    let reason = match (from, action) {
        (ProjectStatus::PendingEvaluation, Action::SubmitForEvaluation) => {
            "the project is already awaiting evaluation".to_string()
        }
        (ProjectStatus::Completed, Action::Grade) => {
            "the project has already been graded".to_string()
        }
        (status, _) if status.is_terminal() => {
            format!("the project is {} and can no longer change", status)
        }
        (status, action) => format!("cannot {} a project that is {}", action.verb(), status),
    };
    LifecycleError::Precondition(reason)
}

/// Validate a 0–100 score.
pub fn validate_score(score: i32) -> Result<(), LifecycleError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(LifecycleError::validation(format!(
            "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
        )));
    }
    Ok(())
}

/// Validate a final grade and return the trimmed feedback.
pub fn validate_grade(score: i32, feedback: &str) -> Result<String, LifecycleError> {
    validate_score(score)?;
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return Err(LifecycleError::validation("grading feedback is required"));
    }
    Ok(feedback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Standing {
        Standing::outsider(Role::Admin)
    }

    fn leader() -> Standing {
        Standing {
            is_leader: true,
            is_member: true,
            ..Standing::outsider(Role::Student)
        }
    }

    fn member() -> Standing {
        Standing {
            is_member: true,
            ..Standing::outsider(Role::Student)
        }
    }

    fn assigned() -> Standing {
        Standing {
            is_assigned_supervisor: true,
            ..Standing::outsider(Role::Supervisor)
        }
    }

    fn targeted() -> Standing {
        Standing {
            is_targeted_supervisor: true,
            ..Standing::outsider(Role::Supervisor)
        }
    }

    #[test]
    fn test_every_legal_transition_has_notices() {
        for from in ProjectStatus::ALL {
            for action in Action::ALL {
                if let Some(rule) = rule(*from, action) {
                    assert!(
                        !rule.notices.is_empty(),
                        "{from} --{action:?}--> {} has no notification",
                        rule.next
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for action in Action::ALL {
            assert!(rule(ProjectStatus::Rejected, action).is_none());
            assert!(rule(ProjectStatus::Completed, action).is_none());
        }
    }

    #[test]
    fn test_only_admin_leaves_pending() {
        for action in Action::ALL {
            if let Some(rule) = rule(ProjectStatus::Pending, action) {
                assert_ne!(rule.next, ProjectStatus::Pending);
                assert_eq!(action.actor(), Actor::Admin);
            }
        }
    }

    #[test]
    fn test_documented_paths() {
        let t = plan(ProjectStatus::Pending, Action::Approve, &admin()).unwrap();
        assert_eq!(t.to, ProjectStatus::Approved);

        let t = plan(ProjectStatus::Pending, Action::ApproveWithSupervisor, &admin()).unwrap();
        assert_eq!(t.to, ProjectStatus::Ongoing);
        assert_eq!(t.notices.len(), 2);

        let t = plan(ProjectStatus::Pending, Action::Reject, &admin()).unwrap();
        assert_eq!(t.to, ProjectStatus::Rejected);

        let t = plan(ProjectStatus::Approved, Action::RequestSupervisor, &member()).unwrap();
        assert_eq!(t.to, ProjectStatus::Approved);
        assert!(!t.changes_status());

        let t = plan(ProjectStatus::Approved, Action::AcceptRequest, &targeted()).unwrap();
        assert_eq!(t.to, ProjectStatus::Ongoing);

        let t = plan(ProjectStatus::Approved, Action::DeclineRequest, &targeted()).unwrap();
        assert_eq!(t.to, ProjectStatus::Approved);

        let t = plan(ProjectStatus::Ongoing, Action::SubmitForEvaluation, &leader()).unwrap();
        assert_eq!(t.to, ProjectStatus::PendingEvaluation);

        let t = plan(ProjectStatus::PendingEvaluation, Action::RequestRevision, &assigned())
            .unwrap();
        assert_eq!(t.to, ProjectStatus::RevisionRequested);

        let t = plan(ProjectStatus::RevisionRequested, Action::Grade, &assigned()).unwrap();
        assert_eq!(t.to, ProjectStatus::Completed);
    }

    #[test]
    fn test_wrong_actor_is_forbidden_not_precondition() {
        let err = plan(ProjectStatus::PendingEvaluation, Action::Grade, &leader()).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));

        let err = plan(ProjectStatus::Pending, Action::Approve, &assigned()).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));

        // Unassigned supervisor cannot grade even though the role matches.
        let outsider = Standing::outsider(Role::Supervisor);
        let err = plan(ProjectStatus::PendingEvaluation, Action::Grade, &outsider).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
    }

    #[test]
    fn test_only_leader_submits_for_evaluation() {
        let err = plan(ProjectStatus::Ongoing, Action::SubmitForEvaluation, &member()).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
    }

    #[test]
    fn test_double_submission_rejected() {
        let err = plan(
            ProjectStatus::PendingEvaluation,
            Action::SubmitForEvaluation,
            &leader(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::Precondition("the project is already awaiting evaluation".into())
        );
    }

    #[test]
    fn test_grading_completed_project_rejected() {
        let err = plan(ProjectStatus::Completed, Action::Grade, &assigned()).unwrap_err();
        assert!(matches!(err, LifecycleError::Precondition(_)));
    }

    #[test]
    fn test_removing_supervisor_reopens_supervision() {
        for from in [
            ProjectStatus::Ongoing,
            ProjectStatus::PendingEvaluation,
            ProjectStatus::RevisionRequested,
        ] {
            let t = plan(from, Action::RemoveSupervisor, &admin()).unwrap();
            assert_eq!(t.to, ProjectStatus::Approved);
            assert_eq!(t.notices, &[notice::SUPERVISOR_REMOVED]);
        }

        // Nothing to remove before assignment, nothing to reopen after grading.
        for from in [ProjectStatus::Pending, ProjectStatus::Approved, ProjectStatus::Completed] {
            assert!(matches!(
                plan(from, Action::RemoveSupervisor, &admin()),
                Err(LifecycleError::Precondition(_))
            ));
        }
        assert!(matches!(
            plan(ProjectStatus::Ongoing, Action::RemoveSupervisor, &assigned()),
            Err(LifecycleError::Forbidden(_))
        ));
    }

    #[test]
    fn test_propose() {
        let t = propose(Role::Student, false).unwrap();
        assert_eq!(t.to, ProjectStatus::Pending);
        assert_eq!(t.notices, &[notice::PROPOSAL_SUBMITTED]);
        assert!(propose(Role::Supervisor, false).is_err());
        assert!(matches!(
            propose(Role::Student, true),
            Err(LifecycleError::Precondition(_))
        ));
    }

    #[test]
    fn test_grade_validation() {
        assert!(matches!(
            validate_grade(105, "Good work"),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(validate_grade(-1, "x"), Err(LifecycleError::Validation(_))));
        assert!(matches!(validate_grade(85, "   "), Err(LifecycleError::Validation(_))));
        assert_eq!(validate_grade(85, " Good work ").unwrap(), "Good work");
        assert!(validate_grade(0, "f").is_ok());
        assert!(validate_grade(100, "f").is_ok());
    }
}
