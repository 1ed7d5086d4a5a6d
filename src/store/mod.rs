//! Persisted tasks and projects.
//!
//! Sub-modules:
//! - `types`: Task/project records and the creation draft.
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: SQLite-backed [`SqliteTaskStore`].
//!
//! The schedulers consume the store exclusively through the narrow
//! [`TaskStore`] trait; the wider CRUD surface on [`SqliteTaskStore`] exists
//! for the UI collaborator and for tests.

pub(crate) mod schema;
pub mod sqlite;
pub mod types;

use chrono::{DateTime, Utc};

use crate::notify::TriggerKind;

pub use sqlite::{SqliteTaskStore, StoreError};
pub use types::{LocationSpec, NewTask, Project, ProjectId, Recurrence, Task, TaskId};

/// The read/write surface the schedulers depend on.
///
/// The scheduling core never creates or deletes tasks: it reads scan
/// results and writes back only the due date (recurrence advance) and the
/// per-trigger notified-at stamps. Implementations must make those writes
/// atomic read-modify-operations so concurrent schedulers cannot lose
/// updates, and must keep each stamp monotonically non-decreasing.
pub trait TaskStore: Send + Sync {
    /// Non-completed tasks with a due instant at or before `instant`.
    fn tasks_due_by(&self, instant: DateTime<Utc>) -> Result<Vec<Task>, StoreError>;

    /// Non-completed tasks carrying a geofence.
    fn tasks_with_location(&self) -> Result<Vec<Task>, StoreError>;

    /// Record a delivered notification for one trigger kind.
    fn mark_notified(
        &self,
        id: TaskId,
        kind: TriggerKind,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Move a non-completed task's due instant (recurrence advance).
    fn reschedule(&self, id: TaskId, due_at: DateTime<Utc>) -> Result<(), StoreError>;
}
