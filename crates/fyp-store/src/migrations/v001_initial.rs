//! v001 -- Initial schema creation.
//!
//! Creates `users`, `projects`, `project_members`, `supervision_requests`,
//! `deadlines` and `notifications`. Nested project documents (tasks,
//! roadmap, submissions, grade) are stored as JSON text columns.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                     TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name                   TEXT NOT NULL,
    email                  TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash          TEXT NOT NULL,              -- argon2 PHC string
    role                   TEXT NOT NULL CHECK (role IN ('student', 'supervisor', 'admin')),
    department             TEXT,
    batch                  TEXT,
    roll_no                TEXT,
    expertise              TEXT NOT NULL DEFAULT '[]', -- JSON array
    max_projects           INTEGER,                    -- NULL = default capacity
    current_projects_count INTEGER NOT NULL DEFAULT 0, -- cache, repaired on read
    has_project            INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    project_id             TEXT,                       -- nullable FK -> projects(id)
    is_leader              INTEGER NOT NULL DEFAULT 0,
    skills                 TEXT NOT NULL DEFAULT '[]',
    bio                    TEXT,
    social_links           TEXT NOT NULL DEFAULT '{}', -- JSON object
    created_at             TEXT NOT NULL,              -- RFC-3339

    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
CREATE INDEX IF NOT EXISTS idx_users_cohort ON users(batch, department);

-- ----------------------------------------------------------------
-- Projects
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS projects (
    id             TEXT PRIMARY KEY NOT NULL,
    title          TEXT NOT NULL,
    description    TEXT NOT NULL,
    proposal_url   TEXT,
    leader_id      TEXT NOT NULL,
    supervisor_id  TEXT,
    status         TEXT NOT NULL CHECK (status IN (
                       'Pending', 'Approved', 'Rejected', 'Ongoing',
                       'Pending Evaluation', 'Revision Requested', 'Completed')),
    submissions    TEXT NOT NULL DEFAULT '[]',
    tasks          TEXT NOT NULL DEFAULT '[]',
    roadmap        TEXT NOT NULL DEFAULT '[]',
    grade          TEXT,                           -- JSON object, NULL until graded
    admin_feedback TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,

    FOREIGN KEY (leader_id) REFERENCES users(id),
    FOREIGN KEY (supervisor_id) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_supervisor_status
    ON projects(supervisor_id, status);
CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);

-- ----------------------------------------------------------------
-- Project membership (leader included)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS project_members (
    project_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    position   INTEGER NOT NULL,

    PRIMARY KEY (project_id, user_id),
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_project_members_user ON project_members(user_id);

-- ----------------------------------------------------------------
-- Supervision requests (one per project/supervisor pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS supervision_requests (
    project_id   TEXT NOT NULL,
    teacher_id   TEXT NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('Sent', 'Accepted', 'Rejected', 'Cancelled')),
    request_date TEXT NOT NULL,

    PRIMARY KEY (project_id, teacher_id),
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (teacher_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_requests_teacher ON supervision_requests(teacher_id, status);

-- ----------------------------------------------------------------
-- Deadlines
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS deadlines (
    id                TEXT PRIMARY KEY NOT NULL,
    title             TEXT NOT NULL,
    description       TEXT NOT NULL,
    deadline_date     TEXT NOT NULL,
    scope             TEXT NOT NULL CHECK (scope IN ('Global', 'Batch', 'Group')),
    batch             TEXT,
    department        TEXT,
    target_project_id TEXT,
    created_by        TEXT,
    is_hard_deadline  INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,

    CHECK ((scope = 'Group') = (target_project_id IS NOT NULL)),
    CHECK (scope != 'Batch' OR (batch IS NOT NULL AND department IS NOT NULL)),
    FOREIGN KEY (target_project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_deadlines_target ON deadlines(target_project_id);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id           TEXT PRIMARY KEY NOT NULL,
    recipient_id TEXT NOT NULL,
    sender_id    TEXT,
    title        TEXT NOT NULL,
    message      TEXT NOT NULL,
    type         TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0,
    link         TEXT NOT NULL DEFAULT '',
    related_id   TEXT,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
