//! Shared notification delivery path.
//!
//! Both schedulers produce "candidate task + trigger kind" and funnel it
//! through [`Delivery::offer`], so the cooldown gate, the dispatch call and
//! the notified-at persistence live in exactly one place.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::notify::{NotificationDispatcher, TriggerKind};
use crate::store::{StoreError, Task, TaskStore};

/// Notification body for the due trigger.
const DUE_BODY: &str = "Task due";

/// Notification body for the location trigger.
const LOCATION_BODY: &str = "You are near this task location";

/// The single delivery path shared by both schedulers.
pub(crate) struct Delivery {
    store: Arc<dyn TaskStore>,
    dispatcher: NotificationDispatcher,
    due_cooldown: Duration,
    location_cooldown: Duration,
}

impl Delivery {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        dispatcher: NotificationDispatcher,
        due_cooldown: Duration,
        location_cooldown: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            due_cooldown,
            location_cooldown,
        }
    }

    /// Offer a candidate task for notification.
    ///
    /// Applies the trigger's cooldown gate, dispatches on pass, and stamps
    /// the task's notified-at clock for that trigger. Returns whether a
    /// notification was dispatched. Dispatch failures are swallowed by the
    /// dispatcher; only store failures surface.
    pub(crate) fn offer(
        &self,
        task: &Task,
        kind: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let (cooldown, body) = match kind {
            TriggerKind::Due => (self.due_cooldown, DUE_BODY),
            TriggerKind::Location => (self.location_cooldown, LOCATION_BODY),
        };
        let window_start = now - cooldown;

        // A stamp exactly on the window edge is old enough for the due
        // trigger but still suppresses the location trigger.
        let suppressed = match task.last_notified_for(kind) {
            Some(last) => match kind {
                TriggerKind::Due => last > window_start,
                TriggerKind::Location => last >= window_start,
            },
            None => false,
        };
        if suppressed {
            debug!(task = %task.id, trigger = %kind, "notification suppressed by cooldown");
            return Ok(false);
        }

        self.dispatcher.dispatch(&task.title, body);
        self.store.mark_notified(task.id, kind, now)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::store::{NewTask, SqliteTaskStore};
    use crate::test_utils::RecordingNotifier;

    fn fixture() -> (Arc<SqliteTaskStore>, Arc<RecordingNotifier>, Delivery) {
        let store = Arc::new(SqliteTaskStore::open_in_memory().expect("store"));
        let notifier = Arc::new(RecordingNotifier::new());
        let delivery = Delivery::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            NotificationDispatcher::new(Arc::clone(&notifier) as _),
            Duration::seconds(60),
            Duration::minutes(30),
        );
        (store, notifier, delivery)
    }

    fn make_task(store: &SqliteTaskStore) -> Task {
        let project = store.add_project("P", None, None).expect("project");
        store
            .create_task(NewTask::titled(project.id, "Water the plants"))
            .expect("task")
    }

    #[test]
    fn first_offer_dispatches_and_stamps() {
        let (store, notifier, delivery) = fixture();
        let task = make_task(&store);
        let now = Utc::now();

        let dispatched = delivery.offer(&task, TriggerKind::Due, now).expect("offer");
        assert!(dispatched);
        assert_eq!(notifier.count(), 1);
        assert_eq!(
            notifier.deliveries()[0],
            ("Water the plants".to_owned(), "Task due".to_owned())
        );

        let loaded = store.get_task(task.id).expect("get").expect("exists");
        assert_eq!(
            loaded.last_due_notified_at.map(|dt| dt.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn due_stamp_inside_window_suppresses() {
        let (store, notifier, delivery) = fixture();
        let mut task = make_task(&store);
        let now = Utc::now();
        task.last_due_notified_at = Some(now - Duration::seconds(10));

        let dispatched = delivery.offer(&task, TriggerKind::Due, now).expect("offer");
        assert!(!dispatched);
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn due_stamp_on_window_edge_dispatches() {
        let (store, notifier, delivery) = fixture();
        let mut task = make_task(&store);
        let now = Utc::now();
        task.last_due_notified_at = Some(now - Duration::seconds(60));

        let dispatched = delivery.offer(&task, TriggerKind::Due, now).expect("offer");
        assert!(dispatched);
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn location_stamp_on_window_edge_suppresses() {
        let (store, notifier, delivery) = fixture();
        let mut task = make_task(&store);
        let now = Utc::now();
        task.last_location_notified_at = Some(now - Duration::minutes(30));

        let dispatched = delivery
            .offer(&task, TriggerKind::Location, now)
            .expect("offer");
        assert!(!dispatched);
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn location_stamp_past_window_dispatches_with_location_body() {
        let (store, notifier, delivery) = fixture();
        let mut task = make_task(&store);
        let now = Utc::now();
        task.last_location_notified_at = Some(now - Duration::minutes(31));

        let dispatched = delivery
            .offer(&task, TriggerKind::Location, now)
            .expect("offer");
        assert!(dispatched);
        assert_eq!(
            notifier.deliveries()[0].1,
            "You are near this task location"
        );
    }

    #[test]
    fn triggers_keep_independent_cooldowns() {
        let (store, notifier, delivery) = fixture();
        let mut task = make_task(&store);
        let now = Utc::now();
        // A fresh location alert must not suppress the due trigger.
        task.last_location_notified_at = Some(now - Duration::seconds(5));

        let dispatched = delivery.offer(&task, TriggerKind::Due, now).expect("offer");
        assert!(dispatched);
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn store_failure_surfaces_after_dispatch() {
        let (store, notifier, delivery) = fixture();
        let mut task = make_task(&store);
        store.delete_task(task.id).expect("delete");
        task.last_due_notified_at = None;

        let result = delivery.offer(&task, TriggerKind::Due, Utc::now());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        // Delivery itself is best-effort and already happened.
        assert_eq!(notifier.count(), 1);
    }
}
