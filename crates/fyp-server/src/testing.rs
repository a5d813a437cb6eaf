//! Fixtures shared by the server's unit tests.

use fyp_shared::types::{Role, UserId};
use fyp_store::{Database, NewUser, Notification, Project, ProfileUpdate, User};
use tempfile::TempDir;

use crate::workflow::{self, ProposalInput};

pub fn open() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("portal.db")).unwrap();
    (db, dir)
}

pub fn email_for(name: &str) -> String {
    format!("{}@uni.test", name.to_lowercase().replace(' ', "."))
}

/// Create an account that cannot log in. Hashing is skipped for speed;
/// login tests create their own accounts.
pub fn user(db: &Database, name: &str, role: Role) -> User {
    db.create_user(&NewUser {
        name: name.to_string(),
        email: email_for(name),
        password_hash: "unusable".to_string(),
        role,
        department: Some("CS".to_string()),
        batch: Some("2026".to_string()),
        roll_no: None,
        expertise: Vec::new(),
        max_projects: None,
    })
    .unwrap()
}

pub fn supervisor(db: &Database, name: &str, max_projects: u32) -> User {
    let sup = user(db, name, Role::Supervisor);
    db.update_profile(
        sup.id,
        &ProfileUpdate {
            max_projects: Some(max_projects),
            ..Default::default()
        },
    )
    .unwrap()
}

/// Submit a proposal led by `leader`, reloading the leader first so the
/// caller's copy may be stale.
pub fn proposal(db: &mut Database, leader: &User, members: &[&User]) -> Project {
    let leader = db.get_user(leader.id).unwrap();
    workflow::submit_proposal(
        db,
        &leader,
        ProposalInput {
            title: format!("{} project", leader.name),
            description: "A final year project".to_string(),
            proposal_url: None,
            members: members.iter().map(|m| m.id).collect(),
        },
    )
    .unwrap()
}

pub fn inbox(db: &Database, id: UserId) -> Vec<Notification> {
    db.list_notifications(id, false, 100).unwrap()
}
