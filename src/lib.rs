//! minitodo: scheduling core for a minimalist personal todo app.
//!
//! Projects contain hierarchical tasks with due dates, recurrence, tags and
//! location reminders, persisted in a local SQLite database. The UI layer
//! is an external collaborator: it drives CRUD through the store and calls
//! the scheduling supervisor exactly once per session.
//!
//! # Architecture
//!
//! The core is built from small subsystems wired together by the
//! supervisor:
//! - **Recurrence engine**: pure preset → rule text → next occurrence math
//! - **Task store**: SQLite-backed records behind the narrow `TaskStore`
//!   trait the schedulers consume
//! - **Due-time scheduler**: fixed-period due scans with cooldown
//!   suppression and recurrence advance
//! - **Location scheduler**: geofence checks driven by pushed position
//!   updates
//! - **Notification dispatcher**: best-effort delivery over the platform
//!   capability; failures are logged, never fatal

pub mod config;
pub mod error;
pub mod geo;
pub mod notify;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod test_utils;

pub use config::CoreConfig;
pub use error::{Result, TodoError};
pub use geo::{GeoCapability, Position};
pub use notify::{NotificationDispatcher, NotifyCapability, PermissionState, TriggerKind};
pub use recurrence::{RecurrencePreset, build_rule, next_occurrence};
pub use scheduler::{SchedulerSupervisor, StartSummary};
pub use store::{
    LocationSpec, NewTask, Project, Recurrence, SqliteTaskStore, Task, TaskStore,
};
