//! Scheduling supervisor: the single initialization entrypoint.
//!
//! Owns the lifecycle of both schedulers. [`SchedulerSupervisor::start`] is
//! idempotent — the first call spawns whatever the available capabilities
//! and settings allow, and every later call is a no-op reporting the same
//! summary. There is no stop surface; schedulers run until process exit.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::delivery::Delivery;
use super::due::DueScheduler;
use super::location::LocationScheduler;
use crate::config::CoreConfig;
use crate::geo::GeoCapability;
use crate::notify::{NotificationDispatcher, NotifyCapability};
use crate::store::TaskStore;

/// What a [`SchedulerSupervisor::start`] call left running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartSummary {
    /// Whether the due-time scheduler is running.
    pub due_scheduler: bool,
    /// Whether the location scheduler is running.
    pub location_scheduler: bool,
}

/// Supervisor lifecycle.
#[derive(Clone, Copy)]
enum Phase {
    Uninitialized,
    Running(StartSummary),
}

/// Owns both schedulers for the life of the process.
pub struct SchedulerSupervisor {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn NotifyCapability>,
    geo: Arc<dyn GeoCapability>,
    config: CoreConfig,
    phase: Mutex<Phase>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SchedulerSupervisor {
    /// Build a supervisor over the store and the platform capabilities.
    pub fn new(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn NotifyCapability>,
        geo: Arc<dyn GeoCapability>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            geo,
            config,
            phase: Mutex::new(Phase::Uninitialized),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start every scheduler the environment supports.
    ///
    /// Must be called from within a tokio runtime. Idempotent: a second
    /// call starts nothing and returns the summary of the first.
    pub fn start(&self) -> StartSummary {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if let Phase::Running(summary) = *phase {
            debug!("schedulers already running, start is a no-op");
            return summary;
        }

        let dispatcher = NotificationDispatcher::new(Arc::clone(&self.notifier));
        let delivery = Arc::new(Delivery::new(
            Arc::clone(&self.store),
            dispatcher.clone(),
            Duration::seconds(self.config.due.cooldown_secs),
            Duration::seconds(self.config.location.cooldown_secs),
        ));

        let mut summary = StartSummary::default();
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);

        if dispatcher.is_available() && self.config.notifications.enable_time_notifications {
            let due = DueScheduler::new(
                Arc::clone(&self.store),
                Arc::clone(&delivery),
                std::time::Duration::from_secs(self.config.due.tick_interval_secs),
            );
            handles.push(due.spawn());
            summary.due_scheduler = true;
        } else {
            info!("due-time scheduler not started (notifications unavailable or disabled)");
        }

        if dispatcher.is_available()
            && self.config.notifications.enable_location_notifications
            && self.geo.is_available()
        {
            match self.geo.watch_positions() {
                Some(positions) => {
                    let location =
                        LocationScheduler::new(Arc::clone(&self.store), Arc::clone(&delivery));
                    handles.push(location.spawn(positions));
                    summary.location_scheduler = true;
                }
                None => warn!("geolocation reported available but produced no position watch"),
            }
        } else {
            info!("location scheduler not started (capability unavailable or disabled)");
        }

        *phase = Phase::Running(summary);
        info!(
            due = summary.due_scheduler,
            location = summary.location_scheduler,
            "scheduling supervisor running"
        );
        summary
    }

    /// Whether `start` has already run.
    pub fn is_running(&self) -> bool {
        matches!(
            *self.phase.lock().unwrap_or_else(PoisonError::into_inner),
            Phase::Running(_)
        )
    }

    /// Number of background tasks spawned so far. Observability only.
    pub fn task_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::geo::{ChannelGeo, UnavailableGeo};
    use crate::notify::UnavailableNotifier;
    use crate::store::SqliteTaskStore;
    use crate::test_utils::RecordingNotifier;

    fn store() -> Arc<dyn TaskStore> {
        Arc::new(SqliteTaskStore::open_in_memory().expect("store"))
    }

    fn location_enabled_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.notifications.enable_location_notifications = true;
        config
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (geo, _tx) = ChannelGeo::new();
        let supervisor = SchedulerSupervisor::new(
            store(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(geo),
            location_enabled_config(),
        );

        assert!(!supervisor.is_running());
        let first = supervisor.start();
        assert!(first.due_scheduler);
        assert!(first.location_scheduler);
        assert_eq!(supervisor.task_count(), 2);

        let second = supervisor.start();
        assert_eq!(second, first);
        assert_eq!(supervisor.task_count(), 2, "no duplicate schedulers");
        assert!(supervisor.is_running());
    }

    #[tokio::test]
    async fn nothing_starts_without_notification_capability() {
        let (geo, _tx) = ChannelGeo::new();
        let supervisor = SchedulerSupervisor::new(
            store(),
            Arc::new(UnavailableNotifier),
            Arc::new(geo),
            location_enabled_config(),
        );

        let summary = supervisor.start();
        assert!(!summary.due_scheduler);
        assert!(!summary.location_scheduler);
        assert_eq!(supervisor.task_count(), 0);
        // The supervisor is still Running: a later call must not retry.
        assert!(supervisor.is_running());
    }

    #[tokio::test]
    async fn location_scheduler_requires_geo_capability() {
        let supervisor = SchedulerSupervisor::new(
            store(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(UnavailableGeo),
            location_enabled_config(),
        );

        let summary = supervisor.start();
        assert!(summary.due_scheduler);
        assert!(!summary.location_scheduler);
    }

    #[tokio::test]
    async fn location_scheduler_respects_settings_toggle() {
        let (geo, _tx) = ChannelGeo::new();
        // Default settings leave location notifications off.
        let supervisor = SchedulerSupervisor::new(
            store(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(geo),
            CoreConfig::default(),
        );

        let summary = supervisor.start();
        assert!(summary.due_scheduler);
        assert!(!summary.location_scheduler);
    }

    #[tokio::test]
    async fn time_toggle_disables_due_scheduler() {
        let mut config = CoreConfig::default();
        config.notifications.enable_time_notifications = false;
        let supervisor = SchedulerSupervisor::new(
            store(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(UnavailableGeo),
            config,
        );

        let summary = supervisor.start();
        assert!(!summary.due_scheduler);
        assert!(!summary.location_scheduler);
    }
}
