//! SQLite-backed task store.
//!
//! Backed by a single database file at `{root_dir}/minitodo.db`. Thread-safe
//! via an internal `Mutex<Connection>`: all writes are serialized, and the
//! scheduler-owned columns (`due_at` on reschedule, the notified-at stamps)
//! are updated with single-statement read-modify-writes so concurrent
//! schedulers cannot lose each other's updates.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use super::schema::{apply_schema, read_schema_version};
use super::types::{LocationSpec, NewTask, Project, ProjectId, Recurrence, Task, TaskId};
use super::TaskStore;
use crate::notify::TriggerKind;
use crate::recurrence::RecurrencePreset;

/// Database filename within the store root directory.
const DB_FILENAME: &str = "minitodo.db";

/// Column list shared by every task SELECT.
const TASK_COLUMNS: &str = "id, project_id, parent_id, title, notes, tags, is_completed, \
     completed_at, due_at, due_timezone, recurrence_preset, recurrence_rule, \
     latitude, longitude, radius_meters, last_due_notified_at, \
     last_location_notified_at, created_at, updated_at";

/// Task store error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure while opening the database.
    #[error("I/O error: {0}")]
    Io(String),

    /// Task or project not found.
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// A row carried data the model cannot represent.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Connection mutex poisoned by a panicked writer.
    #[error("lock poisoned: {0}")]
    Lock(String),
}

impl From<StoreError> for crate::error::TodoError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `{root_dir}/minitodo.db`.
    ///
    /// Applies the schema if the database is new.
    pub fn new(root_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root_dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let db_path = root_dir.join(DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        apply_schema(&conn)?;
        Ok(Self {
            root: root_dir.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            root: PathBuf::new(),
            conn: Mutex::new(conn),
        })
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Seed a fresh database with the Inbox project and welcome tasks.
    ///
    /// No-op when any project already exists.
    pub fn ensure_seed(&self) -> Result<(), StoreError> {
        let count: i64 = {
            let conn = self.lock()?;
            conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?
        };
        if count > 0 {
            return Ok(());
        }

        let inbox = self.add_project("Inbox", None, None)?;
        self.create_task(NewTask::titled(inbox.id, "Welcome to Minimalist Todo"))?;
        let mut tips = NewTask::titled(inbox.id, "Press Ctrl/Cmd + K to open commands");
        tips.tags = vec!["tips".to_owned()];
        self.create_task(tips)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Project CRUD (UI surface)
    // -----------------------------------------------------------------------

    /// Create a project and return the stored record.
    pub fn add_project(
        &self,
        name: &str,
        emoji: Option<&str>,
        color: Option<&str>,
    ) -> Result<Project, StoreError> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            emoji: emoji.map(str::to_owned),
            color: color.map(str::to_owned),
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO projects (id, name, emoji, color, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id.to_string(),
                project.name,
                project.emoji,
                project.color,
                project.created_at.timestamp_millis(),
                project.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(project)
    }

    /// List all projects, oldest first.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, emoji, color, created_at, updated_at \
             FROM projects ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_project)?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?.try_into_project()?);
        }
        Ok(projects)
    }

    /// Delete a project; its tasks cascade.
    pub fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM projects WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Task CRUD (UI surface)
    // -----------------------------------------------------------------------

    /// Create a task from a draft; the store assigns the id and the audit
    /// stamps and returns the stored record.
    pub fn create_task(&self, draft: NewTask) -> Result<Task, StoreError> {
        if let Some(rec) = &draft.recurrence {
            if rec.preset == RecurrencePreset::None {
                return Err(StoreError::InvalidData(
                    "recurrence must be absent for preset `none`".to_owned(),
                ));
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: draft.project_id,
            parent_id: draft.parent_id,
            title: draft.title,
            notes: draft.notes,
            tags: draft.tags,
            is_completed: false,
            completed_at: None,
            due_at: draft.due_at,
            due_timezone: draft.due_timezone,
            recurrence: draft.recurrence,
            location: draft.location,
            last_due_notified_at: None,
            last_location_notified_at: None,
            created_at: now,
            updated_at: now,
        };

        let tags_json =
            serde_json::to_string(&task.tags).unwrap_or_else(|_| "[]".to_owned());
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (id, project_id, parent_id, title, notes, tags, \
             is_completed, completed_at, due_at, due_timezone, recurrence_preset, \
             recurrence_rule, latitude, longitude, radius_meters, \
             last_due_notified_at, last_location_notified_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19)",
            params![
                task.id.to_string(),
                task.project_id.to_string(),
                task.parent_id.map(|id| id.to_string()),
                task.title,
                task.notes,
                tags_json,
                task.is_completed,
                opt_millis(task.completed_at),
                opt_millis(task.due_at),
                task.due_timezone,
                task.recurrence.as_ref().map(|r| r.preset.as_str()),
                task.recurrence.as_ref().and_then(|r| r.rule.clone()),
                task.location.as_ref().map(|l| l.latitude),
                task.location.as_ref().map(|l| l.longitude),
                task.location.as_ref().map(|l| l.radius_meters),
                opt_millis(task.last_due_notified_at),
                opt_millis(task.last_location_notified_at),
                task.created_at.timestamp_millis(),
                task.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(task)
    }

    /// Fetch one task by id.
    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id.to_string()], row_to_task_raw)?;
        match rows.next() {
            Some(row) => Ok(Some(row?.try_into_task()?)),
            None => Ok(None),
        }
    }

    /// List a project's tasks, oldest first.
    pub fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?1 \
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id.to_string()], row_to_task_raw)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.try_into_task()?);
        }
        Ok(tasks)
    }

    /// Rewrite a task's UI-owned fields.
    ///
    /// The notified-at stamps are scheduler-owned and deliberately excluded:
    /// a stale UI snapshot must not roll back a stamp a scheduler wrote
    /// concurrently.
    pub fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        if let Some(rec) = &task.recurrence {
            if rec.preset == RecurrencePreset::None {
                return Err(StoreError::InvalidData(
                    "recurrence must be absent for preset `none`".to_owned(),
                ));
            }
        }

        let tags_json =
            serde_json::to_string(&task.tags).unwrap_or_else(|_| "[]".to_owned());
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET project_id = ?2, parent_id = ?3, title = ?4, notes = ?5, \
             tags = ?6, is_completed = ?7, completed_at = ?8, due_at = ?9, \
             due_timezone = ?10, recurrence_preset = ?11, recurrence_rule = ?12, \
             latitude = ?13, longitude = ?14, radius_meters = ?15, updated_at = ?16 \
             WHERE id = ?1",
            params![
                task.id.to_string(),
                task.project_id.to_string(),
                task.parent_id.map(|id| id.to_string()),
                task.title,
                task.notes,
                tags_json,
                task.is_completed,
                opt_millis(task.completed_at),
                opt_millis(task.due_at),
                task.due_timezone,
                task.recurrence.as_ref().map(|r| r.preset.as_str()),
                task.recurrence.as_ref().and_then(|r| r.rule.clone()),
                task.location.as_ref().map(|l| l.latitude),
                task.location.as_ref().map(|l| l.longitude),
                task.location.as_ref().map(|l| l.radius_meters),
                Utc::now().timestamp_millis(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(task.id));
        }
        Ok(())
    }

    /// Mark a task completed, exempting it from all scheduling.
    pub fn complete_task(&self, id: TaskId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET is_completed = 1, completed_at = ?2, updated_at = ?3 \
             WHERE id = ?1",
            params![
                id.to_string(),
                at.timestamp_millis(),
                Utc::now().timestamp_millis()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Delete a task; child tasks cascade.
    pub fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

impl TaskStore for SqliteTaskStore {
    fn tasks_due_by(&self, instant: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE is_completed = 0 AND due_at IS NOT NULL AND due_at <= ?1 \
             ORDER BY due_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![instant.timestamp_millis()], row_to_task_raw)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.try_into_task()?);
        }
        Ok(tasks)
    }

    fn tasks_with_location(&self) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE is_completed = 0 AND latitude IS NOT NULL AND longitude IS NOT NULL \
             AND radius_meters IS NOT NULL \
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_task_raw)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.try_into_task()?);
        }
        Ok(tasks)
    }

    fn mark_notified(
        &self,
        id: TaskId,
        kind: TriggerKind,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // Single-statement read-modify-write: MAX() keeps the stamp
        // monotonically non-decreasing even when both schedulers race.
        let sql = match kind {
            TriggerKind::Due => {
                "UPDATE tasks SET \
                 last_due_notified_at = MAX(COALESCE(last_due_notified_at, 0), ?2), \
                 updated_at = MAX(updated_at, ?3) WHERE id = ?1"
            }
            TriggerKind::Location => {
                "UPDATE tasks SET \
                 last_location_notified_at = MAX(COALESCE(last_location_notified_at, 0), ?2), \
                 updated_at = MAX(updated_at, ?3) WHERE id = ?1"
            }
        };

        let conn = self.lock()?;
        let changed = conn.execute(
            sql,
            params![
                id.to_string(),
                at.timestamp_millis(),
                Utc::now().timestamp_millis()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn reschedule(&self, id: TaskId, due_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET due_at = ?2, updated_at = ?3 \
             WHERE id = ?1 AND is_completed = 0",
            params![
                id.to_string(),
                due_at.timestamp_millis(),
                Utc::now().timestamp_millis()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

/// Raw task row, converted outside the rusqlite callback so model-level
/// failures surface as [`StoreError::InvalidData`] rather than SQLite errors.
struct TaskRow {
    id: String,
    project_id: String,
    parent_id: Option<String>,
    title: String,
    notes: Option<String>,
    tags_json: String,
    is_completed: bool,
    completed_at: Option<i64>,
    due_at: Option<i64>,
    due_timezone: Option<String>,
    recurrence_preset: Option<String>,
    recurrence_rule: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius_meters: Option<f64>,
    last_due_notified_at: Option<i64>,
    last_location_notified_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn row_to_task_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        parent_id: row.get(2)?,
        title: row.get(3)?,
        notes: row.get(4)?,
        tags_json: row.get(5)?,
        is_completed: row.get(6)?,
        completed_at: row.get(7)?,
        due_at: row.get(8)?,
        due_timezone: row.get(9)?,
        recurrence_preset: row.get(10)?,
        recurrence_rule: row.get(11)?,
        latitude: row.get(12)?,
        longitude: row.get(13)?,
        radius_meters: row.get(14)?,
        last_due_notified_at: row.get(15)?,
        last_location_notified_at: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task, StoreError> {
        let recurrence = match self.recurrence_preset {
            Some(name) => {
                let preset = RecurrencePreset::parse(&name).ok_or_else(|| {
                    StoreError::InvalidData(format!("unknown recurrence preset `{name}`"))
                })?;
                Some(Recurrence {
                    preset,
                    rule: self.recurrence_rule,
                })
            }
            None => None,
        };

        let location = match (self.latitude, self.longitude, self.radius_meters) {
            (Some(latitude), Some(longitude), Some(radius_meters)) => Some(LocationSpec {
                latitude,
                longitude,
                radius_meters,
            }),
            (None, None, None) => None,
            _ => {
                return Err(StoreError::InvalidData(
                    "partial location columns on task row".to_owned(),
                ));
            }
        };

        Ok(Task {
            id: parse_uuid(&self.id)?,
            project_id: parse_uuid(&self.project_id)?,
            parent_id: self.parent_id.as_deref().map(parse_uuid).transpose()?,
            title: self.title,
            notes: self.notes,
            tags: serde_json::from_str(&self.tags_json).map_err(|e| {
                StoreError::InvalidData(format!("invalid tags JSON: {e}"))
            })?,
            is_completed: self.is_completed,
            completed_at: self.completed_at.map(datetime_from_millis).transpose()?,
            due_at: self.due_at.map(datetime_from_millis).transpose()?,
            due_timezone: self.due_timezone,
            recurrence,
            location,
            last_due_notified_at: self
                .last_due_notified_at
                .map(datetime_from_millis)
                .transpose()?,
            last_location_notified_at: self
                .last_location_notified_at
                .map(datetime_from_millis)
                .transpose()?,
            created_at: datetime_from_millis(self.created_at)?,
            updated_at: datetime_from_millis(self.updated_at)?,
        })
    }
}

/// Raw project row, same two-phase conversion as tasks.
struct ProjectRow {
    id: String,
    name: String,
    emoji: Option<String>,
    color: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        name: row.get(1)?,
        emoji: row.get(2)?,
        color: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl ProjectRow {
    fn try_into_project(self) -> Result<Project, StoreError> {
        Ok(Project {
            id: parse_uuid(&self.id)?,
            name: self.name,
            emoji: self.emoji,
            color: self.color,
            created_at: datetime_from_millis(self.created_at)?,
            updated_at: datetime_from_millis(self.updated_at)?,
        })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in store")))
}

fn opt_millis(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(|dt| dt.timestamp_millis())
}

fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {millis}")))
}
