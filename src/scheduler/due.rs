//! Due-time scheduler: the fixed-period due scan.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::delivery::Delivery;
use crate::notify::TriggerKind;
use crate::recurrence::next_occurrence;
use crate::store::{StoreError, Task, TaskStore};

/// Periodic scanner for tasks whose due instant has passed.
pub(crate) struct DueScheduler {
    store: Arc<dyn TaskStore>,
    delivery: Arc<Delivery>,
    tick_interval: std::time::Duration,
}

impl DueScheduler {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        delivery: Arc<Delivery>,
        tick_interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            delivery,
            tick_interval,
        }
    }

    /// Start the background loop. Runs for the life of the process.
    pub(crate) fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?self.tick_interval, "due-time scheduler started");
            let mut interval = tokio::time::interval(self.tick_interval);
            // A slow scan delays the next tick instead of bursting, so two
            // scans can never overlap.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.tick(Utc::now());
            }
        })
    }

    /// One due scan at `now`.
    pub(crate) fn tick(&self, now: DateTime<Utc>) {
        let due = match self.store.tasks_due_by(now) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("due scan failed: {e}");
                return;
            }
        };
        if !due.is_empty() {
            debug!(count = due.len(), "due scan found candidates");
        }
        for task in &due {
            if let Err(e) = self.process(task, now) {
                // One bad record must not abort the whole tick.
                warn!(task = %task.id, "skipping task after store error: {e}");
            }
        }
    }

    fn process(&self, task: &Task, now: DateTime<Utc>) -> Result<(), StoreError> {
        if !self.delivery.offer(task, TriggerKind::Due, now)? {
            return Ok(());
        }

        let Some(recurrence) = &task.recurrence else {
            // Non-recurring tasks stay due until completed or rescheduled;
            // the cooldown alone paces their re-notification.
            return Ok(());
        };
        let Some(rule) = recurrence.rule.as_deref() else {
            return Ok(());
        };
        let Some(due_at) = task.due_at else {
            return Ok(());
        };

        // Advance strictly past the occurrence that just fired.
        match next_occurrence(rule, Some(due_at + Duration::seconds(1))) {
            Ok(Some(next)) => {
                self.store.reschedule(task.id, next)?;
                debug!(task = %task.id, %next, "recurrence advanced");
            }
            Ok(None) => {
                debug!(task = %task.id, "recurrence exhausted, due date left unchanged");
            }
            Err(e) => {
                // Likely a corrupted prior write.
                warn!(task = %task.id, "unparseable recurrence rule, due date left unchanged: {e}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::notify::NotificationDispatcher;
    use crate::recurrence::{RecurrencePreset, build_rule};
    use crate::store::{NewTask, Recurrence, SqliteTaskStore};
    use crate::test_utils::RecordingNotifier;
    use uuid::Uuid;

    fn fixture() -> (Arc<SqliteTaskStore>, Arc<RecordingNotifier>, DueScheduler) {
        let store = Arc::new(SqliteTaskStore::open_in_memory().expect("store"));
        let notifier = Arc::new(RecordingNotifier::new());
        let delivery = Arc::new(Delivery::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            NotificationDispatcher::new(Arc::clone(&notifier) as _),
            Duration::seconds(60),
            Duration::minutes(30),
        ));
        let scheduler = DueScheduler::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            delivery,
            std::time::Duration::from_secs(60),
        );
        (store, notifier, scheduler)
    }

    fn project_id(store: &SqliteTaskStore) -> Uuid {
        store.add_project("P", None, None).expect("project").id
    }

    #[test]
    fn overdue_task_notifies_and_stamps() {
        let (store, notifier, scheduler) = fixture();
        let now = Utc::now();

        let mut draft = NewTask::titled(project_id(&store), "Pay rent");
        draft.due_at = Some(now - Duration::seconds(1));
        let task = store.create_task(draft).expect("task");

        scheduler.tick(now);

        assert_eq!(notifier.count(), 1);
        assert_eq!(
            notifier.deliveries()[0],
            ("Pay rent".to_owned(), "Task due".to_owned())
        );
        let loaded = store.get_task(task.id).expect("get").expect("exists");
        assert_eq!(
            loaded.last_due_notified_at.map(|dt| dt.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn recent_stamp_suppresses_second_tick() {
        let (store, notifier, scheduler) = fixture();
        let now = Utc::now();

        let mut draft = NewTask::titled(project_id(&store), "t");
        draft.due_at = Some(now - Duration::seconds(1));
        store.create_task(draft).expect("task");

        scheduler.tick(now);
        // An overlapping scan ten seconds later is inside the cooldown.
        scheduler.tick(now + Duration::seconds(10));

        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn nag_until_done_renotifies_after_cooldown() {
        let (store, notifier, scheduler) = fixture();
        let now = Utc::now();

        let mut draft = NewTask::titled(project_id(&store), "t");
        draft.due_at = Some(now - Duration::seconds(1));
        let task = store.create_task(draft).expect("task");

        scheduler.tick(now);
        scheduler.tick(now + Duration::seconds(61));

        // Still due (no recurrence), so it nags once per cooldown window.
        assert_eq!(notifier.count(), 2);
        let loaded = store.get_task(task.id).expect("get").expect("exists");
        assert_eq!(
            loaded.due_at.map(|dt| dt.timestamp_millis()),
            Some((now - Duration::seconds(1)).timestamp_millis()),
            "non-recurring due date must not move"
        );
    }

    #[test]
    fn completed_task_never_notifies() {
        let (store, notifier, scheduler) = fixture();
        let now = Utc::now();

        let mut draft = NewTask::titled(project_id(&store), "t");
        draft.due_at = Some(now - Duration::hours(1));
        let task = store.create_task(draft).expect("task");
        store.complete_task(task.id, now).expect("complete");

        scheduler.tick(now);
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn daily_recurrence_advances_due_date_one_day() {
        let (store, notifier, scheduler) = fixture();
        let now = Utc::now();
        let due_at = now - Duration::seconds(1);

        let mut draft = NewTask::titled(project_id(&store), "Standup");
        draft.due_at = Some(due_at);
        draft.recurrence = Some(Recurrence {
            preset: RecurrencePreset::Daily,
            rule: build_rule(RecurrencePreset::Daily, due_at),
        });
        let task = store.create_task(draft).expect("task");

        scheduler.tick(now);

        assert_eq!(notifier.count(), 1);
        let loaded = store.get_task(task.id).expect("get").expect("exists");
        assert_eq!(
            loaded.due_at.map(|dt| dt.timestamp_millis()),
            Some((due_at + Duration::days(1)).timestamp_millis())
        );
        // Advanced out of the scan window: the next tick stays quiet.
        scheduler.tick(now + Duration::seconds(61));
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn malformed_rule_leaves_due_date_unchanged() {
        let (store, notifier, scheduler) = fixture();
        let now = Utc::now();
        let due_at = now - Duration::seconds(1);

        let mut draft = NewTask::titled(project_id(&store), "t");
        draft.due_at = Some(due_at);
        draft.recurrence = Some(Recurrence {
            preset: RecurrencePreset::Custom,
            rule: Some("RRULE:FREQ=SOMETIMES".to_owned()),
        });
        let task = store.create_task(draft).expect("task");

        scheduler.tick(now);

        // Notification still goes out; only the advance is skipped.
        assert_eq!(notifier.count(), 1);
        let loaded = store.get_task(task.id).expect("get").expect("exists");
        assert_eq!(
            loaded.due_at.map(|dt| dt.timestamp_millis()),
            Some(due_at.timestamp_millis())
        );
    }

    #[test]
    fn one_bad_record_does_not_abort_the_tick() {
        let (store, notifier, _scheduler) = fixture();
        let now = Utc::now();
        let project = project_id(&store);

        struct VanishingStore {
            inner: Arc<SqliteTaskStore>,
            vanish: Uuid,
        }

        impl TaskStore for VanishingStore {
            fn tasks_due_by(&self, instant: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
                self.inner.tasks_due_by(instant)
            }
            fn tasks_with_location(&self) -> Result<Vec<Task>, StoreError> {
                self.inner.tasks_with_location()
            }
            fn mark_notified(
                &self,
                id: Uuid,
                kind: TriggerKind,
                at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                if id == self.vanish {
                    return Err(StoreError::NotFound(id));
                }
                self.inner.mark_notified(id, kind, at)
            }
            fn reschedule(&self, id: Uuid, due_at: DateTime<Utc>) -> Result<(), StoreError> {
                self.inner.reschedule(id, due_at)
            }
        }

        let mut first = NewTask::titled(project, "first");
        first.due_at = Some(now - Duration::seconds(2));
        let first = store.create_task(first).expect("first");

        let mut second = NewTask::titled(project, "second");
        second.due_at = Some(now - Duration::seconds(1));
        let second = store.create_task(second).expect("second");

        let flaky = Arc::new(VanishingStore {
            inner: Arc::clone(&store),
            vanish: first.id,
        });
        let delivery = Arc::new(Delivery::new(
            Arc::clone(&flaky) as Arc<dyn TaskStore>,
            NotificationDispatcher::new(Arc::clone(&notifier) as _),
            Duration::seconds(60),
            Duration::minutes(30),
        ));
        let scheduler = DueScheduler::new(
            flaky as Arc<dyn TaskStore>,
            delivery,
            std::time::Duration::from_secs(60),
        );

        scheduler.tick(now);

        // The failing first task is skipped; the second still lands.
        let loaded = store.get_task(second.id).expect("get").expect("exists");
        assert!(loaded.last_due_notified_at.is_some());
    }
}
