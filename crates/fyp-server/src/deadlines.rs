//! Deadline rules: who may create and delete them, and who hears about it.

use fyp_shared::notice;
use fyp_shared::types::{DeadlineId, DeadlineScope, Role, UserId};
use fyp_store::{Database, Deadline, NewDeadline, User};

use crate::error::ServerError;
use crate::fanout::{self, Event};
use crate::workflow::load_project;

/// Create a deadline and announce it to the students it applies to.
///
/// Global and Batch deadlines are admin-only. A Group deadline may also be
/// set by the target project's assigned supervisor.
pub fn create(db: &mut Database, actor: &User, new: NewDeadline) -> Result<Deadline, ServerError> {
    let new = new.normalized();
    new.validate()?;

    let students: Vec<UserId> = match new.scope {
        DeadlineScope::Global | DeadlineScope::Batch if actor.role != Role::Admin => {
            return Err(ServerError::Forbidden(
                "only admins may set global or batch deadlines".into(),
            ));
        }
        DeadlineScope::Global => db.user_ids_with_role(Role::Student)?,
        DeadlineScope::Batch => {
            db.student_ids_in_cohort(new.batch.as_deref(), new.department.as_deref())?
        }
        DeadlineScope::Group => {
            let target = new
                .target_project
                .ok_or_else(|| ServerError::BadRequest("target project is required".into()))?;
            let project = load_project(db, target)?;
            if actor.role != Role::Admin && project.supervisor != Some(actor.id) {
                return Err(ServerError::Forbidden(
                    "only the project's supervisor or an admin may set its deadlines".into(),
                ));
            }
            project.members
        }
    };

    let deadline = db.create_deadline(&new, actor.id)?;
    tracing::info!(
        deadline = %deadline.id,
        scope = %deadline.scope,
        creator = %actor.id,
        "deadline created"
    );

    let event = Event::for_deadline(&[notice::DEADLINE_CREATED], &deadline, actor, students);
    fanout::deliver(db, &event);
    Ok(deadline)
}

/// Delete a deadline. Only its creator or an admin may do so.
pub fn delete(db: &Database, actor: &User, id: DeadlineId) -> Result<(), ServerError> {
    let deadline = db
        .get_deadline(id)
        .map_err(|e| ServerError::from(e).or_not_found("Deadline"))?;
    if actor.role != Role::Admin && deadline.created_by != Some(actor.id) {
        return Err(ServerError::Forbidden(
            "only the creator or an admin may delete a deadline".into(),
        ));
    }
    if !db.delete_deadline(id)? {
        return Err(ServerError::NotFound("Deadline"));
    }
    tracing::info!(deadline = %id, actor = %actor.id, "deadline deleted");
    Ok(())
}
