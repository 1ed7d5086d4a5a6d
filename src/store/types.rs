//! Task and project records plus the small helpers shared by the store
//! backends and the schedulers.

use crate::notify::TriggerKind;
use crate::recurrence::RecurrencePreset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier, assigned by the store on creation.
pub type TaskId = Uuid;

/// Opaque project identifier.
pub type ProjectId = Uuid;

/// A circular geofence around a point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSpec {
    /// Center latitude in degrees.
    pub latitude: f64,
    /// Center longitude in degrees.
    pub longitude: f64,
    /// Geofence radius in meters; the boundary is inclusive.
    pub radius_meters: f64,
}

/// Recurrence attached to a task.
///
/// Present exactly when the preset is not `none`; `rule` is the canonical
/// rule text, absent for a `custom` preset until the user supplies one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Which preset produced the rule.
    pub preset: RecurrencePreset,
    /// Canonical rule text, re-parseable by the recurrence engine.
    pub rule: Option<String>,
}

/// A project grouping tasks. Owning collaborator for tasks; not itself part
/// of the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Stable project id.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// Optional emoji shown in the sidebar.
    pub emoji: Option<String>,
    /// Optional accent color token.
    pub color: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last-modified instant.
    pub updated_at: DateTime<Utc>,
}

/// A task record. The scheduling core reads tasks and writes only `due_at`
/// (recurrence advance) and the per-trigger notified-at stamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable task id.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Optional parent task for hierarchical lists.
    pub parent_id: Option<TaskId>,
    /// Display title; also the notification title.
    pub title: String,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Tag names attached to the task.
    pub tags: Vec<String>,
    /// Completed tasks are exempt from all scheduling.
    pub is_completed: bool,
    /// When the task was completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Due instant, normalized to UTC.
    pub due_at: Option<DateTime<Utc>>,
    /// IANA timezone name for display; never used in occurrence math.
    pub due_timezone: Option<String>,
    /// Active recurrence, if any.
    pub recurrence: Option<Recurrence>,
    /// Geofence for location reminders, if any.
    pub location: Option<LocationSpec>,
    /// Most recent due-trigger notification instant.
    pub last_due_notified_at: Option<DateTime<Utc>>,
    /// Most recent location-trigger notification instant.
    pub last_location_notified_at: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last-modified instant.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Notified-at stamp for the given trigger kind.
    #[must_use]
    pub fn last_notified_for(&self, kind: TriggerKind) -> Option<DateTime<Utc>> {
        match kind {
            TriggerKind::Due => self.last_due_notified_at,
            TriggerKind::Location => self.last_location_notified_at,
        }
    }
}

/// Fields the caller supplies when creating a task; the store assigns the
/// id and the audit stamps.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Owning project.
    pub project_id: ProjectId,
    /// Optional parent task.
    pub parent_id: Option<TaskId>,
    /// Display title.
    pub title: String,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Tag names.
    pub tags: Vec<String>,
    /// Due instant, UTC.
    pub due_at: Option<DateTime<Utc>>,
    /// Display timezone.
    pub due_timezone: Option<String>,
    /// Recurrence to attach.
    pub recurrence: Option<Recurrence>,
    /// Geofence to attach.
    pub location: Option<LocationSpec>,
}

impl NewTask {
    /// Minimal draft: a titled task in a project.
    #[must_use]
    pub fn titled(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn titled_draft_has_defaults() {
        let project = Uuid::new_v4();
        let draft = NewTask::titled(project, "Buy milk");
        assert_eq!(draft.project_id, project);
        assert_eq!(draft.title, "Buy milk");
        assert!(draft.due_at.is_none());
        assert!(draft.recurrence.is_none());
        assert!(draft.location.is_none());
        assert!(draft.tags.is_empty());
    }

    #[test]
    fn last_notified_for_selects_per_trigger_stamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            parent_id: None,
            title: "t".to_owned(),
            notes: None,
            tags: Vec::new(),
            is_completed: false,
            completed_at: None,
            due_at: None,
            due_timezone: None,
            recurrence: None,
            location: None,
            last_due_notified_at: Some(now),
            last_location_notified_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(task.last_notified_for(TriggerKind::Due), Some(now));
        assert_eq!(task.last_notified_for(TriggerKind::Location), None);
    }

    #[test]
    fn task_serde_round_trip() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            parent_id: None,
            title: "Water the plants".to_owned(),
            notes: Some("balcony first".to_owned()),
            tags: vec!["home".to_owned()],
            is_completed: false,
            completed_at: None,
            due_at: Some(now),
            due_timezone: Some("Europe/London".to_owned()),
            recurrence: Some(Recurrence {
                preset: RecurrencePreset::Daily,
                rule: Some("DTSTART:20240115T090000Z\nRRULE:FREQ=DAILY".to_owned()),
            }),
            location: Some(LocationSpec {
                latitude: 51.5,
                longitude: -0.12,
                radius_meters: 100.0,
            }),
            last_due_notified_at: None,
            last_location_notified_at: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&task).unwrap();
        let restored: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, task);
    }
}
