//! SQLite DDL definitions for the task store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Current schema version stamped into fresh databases.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL for the task database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Enable WAL mode for concurrent reads during writes.
PRAGMA journal_mode = WAL;

-- Enforce foreign key constraints.
PRAGMA foreign_keys = ON;

-- Schema version tracking.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Projects grouping tasks.
CREATE TABLE IF NOT EXISTS projects (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    emoji      TEXT,
    color      TEXT,
    created_at INTEGER NOT NULL DEFAULT 0,  -- epoch milliseconds
    updated_at INTEGER NOT NULL DEFAULT 0
);

-- Task records — mirrors Task fields. All instants are UTC epoch
-- milliseconds; due_timezone is a display hint only.
CREATE TABLE IF NOT EXISTS tasks (
    id                        TEXT PRIMARY KEY,
    project_id                TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    parent_id                 TEXT REFERENCES tasks(id) ON DELETE CASCADE,
    title                     TEXT NOT NULL,
    notes                     TEXT,
    tags                      TEXT NOT NULL DEFAULT '[]',  -- JSON array of tag names
    is_completed              INTEGER NOT NULL DEFAULT 0,
    completed_at              INTEGER,
    due_at                    INTEGER,
    due_timezone              TEXT,
    recurrence_preset         TEXT,   -- snake_case RecurrencePreset variant
    recurrence_rule           TEXT,   -- canonical rule text
    latitude                  REAL,
    longitude                 REAL,
    radius_meters             REAL,
    last_due_notified_at      INTEGER,
    last_location_notified_at INTEGER,
    created_at                INTEGER NOT NULL DEFAULT 0,
    updated_at                INTEGER NOT NULL DEFAULT 0
);

-- Indexes for the scheduler scans and project listings.
CREATE INDEX IF NOT EXISTS idx_tasks_project   ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_tasks_due_at    ON tasks(due_at);
CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(is_completed);
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times — all statements use `IF NOT EXISTS`.
/// Inserts the current schema version into `schema_meta` if not already
/// present.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version_str = CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the `schema_meta` table is empty or the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
