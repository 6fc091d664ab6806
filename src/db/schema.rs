//! SQL schema definitions

pub const USERS: &str = "users";
pub const PROJECTS: &str = "projects";
pub const WORK_HOURS: &str = "work_hours";
pub const SESSION: &str = "session";
pub const MIGRATIONS: &str = "migrations";

/// Ledger of applied migrations. Created outside the registry because the
/// runner has to query it before any migration can be considered.
pub const LEDGER: &str = r#"
CREATE TABLE IF NOT EXISTS migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'applied'
);
"#;

pub const CREATE_INITIAL_TABLES_UP: &str = r#"
-- Users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone_number TEXT,
    hms_user TEXT,
    created_at INTEGER DEFAULT (strftime('%s', 'now') * 1000),
    updated_at INTEGER DEFAULT (strftime('%s', 'now') * 1000)
);

-- Projects table: 1 = home, 2 = office, 3 = client
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    location INTEGER NOT NULL CHECK (location IN (1, 2, 3)),
    is_active INTEGER DEFAULT 1,
    created_at INTEGER DEFAULT (strftime('%s', 'now') * 1000),
    updated_at INTEGER DEFAULT (strftime('%s', 'now') * 1000),
    UNIQUE (name, location)
);

-- Work sessions; end_work_time is NULL while the session is running
CREATE TABLE IF NOT EXISTS work_hours (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    start_work_time INTEGER NOT NULL,
    end_work_time INTEGER,
    break_time INTEGER DEFAULT 0,
    notes TEXT,
    created_at INTEGER DEFAULT (strftime('%s', 'now') * 1000),
    updated_at INTEGER DEFAULT (strftime('%s', 'now') * 1000),
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Signed-in user on this device, at most one row
CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    user_id INTEGER NOT NULL,
    signed_in_at INTEGER NOT NULL,
    last_activity INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_work_hours_user_id ON work_hours(user_id);
CREATE INDEX IF NOT EXISTS idx_work_hours_project_id ON work_hours(project_id);
CREATE INDEX IF NOT EXISTS idx_work_hours_start_time ON work_hours(start_work_time);
CREATE INDEX IF NOT EXISTS idx_projects_location ON projects(location);
CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
"#;

pub const CREATE_INITIAL_TABLES_DOWN: &str = r#"
DROP INDEX IF EXISTS idx_users_email;
DROP INDEX IF EXISTS idx_projects_location;
DROP INDEX IF EXISTS idx_work_hours_start_time;
DROP INDEX IF EXISTS idx_work_hours_project_id;
DROP INDEX IF EXISTS idx_work_hours_user_id;

DROP TABLE IF EXISTS session;
DROP TABLE IF EXISTS work_hours;
DROP TABLE IF EXISTS projects;
DROP TABLE IF EXISTS users;
"#;

/// Stores created before the ledger existed ran version 1 without recording it.
/// The current runner always records version 1 first, so this only inserts for
/// ledgers written by older builds.
pub const CREATE_MIGRATION_TRACKING_UP: &str = r#"
INSERT OR IGNORE INTO migrations (version, name, applied_at, status)
VALUES (1, 'create_initial_tables', strftime('%s', 'now') * 1000, 'applied');
"#;

pub const CREATE_MIGRATION_TRACKING_DOWN: &str = "";

pub const SINGLE_ACTIVE_WORK_SESSION_UP: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_work_hours_one_active
    ON work_hours(user_id) WHERE end_work_time IS NULL;
"#;

pub const SINGLE_ACTIVE_WORK_SESSION_DOWN: &str = r#"
DROP INDEX IF EXISTS idx_work_hours_one_active;
"#;
