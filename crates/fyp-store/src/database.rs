//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// How long a writer waits for a competing connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default portal database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/fyp-portal/fyp-portal.db`
    /// - macOS:   `~/Library/Application Support/edu.fyp.fyp-portal/fyp-portal.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\fyp\fyp-portal\data\fyp-portal.db`
    pub fn new() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    /// Default location of the database file, creating its directory.
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("edu", "fyp", "fyp-portal").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("fyp-portal.db"))
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// This is useful for tests and for deployments that mount the database
    /// on a dedicated volume.
    pub fn open_at(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed helpers, but direct access is
    /// occasionally needed for ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return a mutable reference to the underlying connection, needed to
    /// open transactions.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use fyp_shared::types::Role;
    use tempfile::TempDir;

    use super::Database;
    use crate::models::{NewProject, NewUser, Project, User};

    pub fn open() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    pub fn user(db: &Database, name: &str, role: Role) -> User {
        db.create_user(&NewUser {
            name: name.to_string(),
            email: format!("{}@uni.test", name.to_lowercase().replace(' ', ".")),
            password_hash: "x".to_string(),
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
        db.conn()
            .execute(
                "UPDATE users SET max_projects = ?1 WHERE id = ?2",
                rusqlite::params![max_projects, sup.id.to_string()],
            )
            .unwrap();
        db.get_user(sup.id).unwrap()
    }

    pub fn proposal(db: &mut Database, leader: &User, members: &[&User]) -> Project {
        db.insert_proposal(&NewProject {
            title: format!("{} project", leader.name),
            description: "An FYP".to_string(),
            proposal_url: None,
            leader: leader.id,
            members: members.iter().map(|m| m.id).collect(),
            created_at: Utc::now(),
        })
        .unwrap()
    }
}
