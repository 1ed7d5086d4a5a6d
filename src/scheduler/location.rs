//! Location scheduler: event-driven geofence checks.
//!
//! Unlike the due-time scheduler this never runs on a timer — the sensor
//! owns the cadence and pushes position updates over a channel, in bursts
//! if it likes. The per-task cooldown keeps bursts from double-notifying.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::delivery::Delivery;
use crate::geo::{Position, haversine_meters};
use crate::notify::TriggerKind;
use crate::store::TaskStore;

/// Geofence watcher fed by the platform position stream.
pub(crate) struct LocationScheduler {
    store: Arc<dyn TaskStore>,
    delivery: Arc<Delivery>,
}

impl LocationScheduler {
    pub(crate) fn new(store: Arc<dyn TaskStore>, delivery: Arc<Delivery>) -> Self {
        Self { store, delivery }
    }

    /// Consume the position stream for the life of the process.
    pub(crate) fn spawn(
        self,
        mut positions: mpsc::UnboundedReceiver<Position>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("location scheduler started");
            while let Some(position) = positions.recv().await {
                self.on_position(position, Utc::now());
            }
            debug!("position stream closed, location scheduler stopped");
        })
    }

    /// Handle one position update at `now`.
    pub(crate) fn on_position(&self, position: Position, now: DateTime<Utc>) {
        let tasks = match self.store.tasks_with_location() {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("location scan failed: {e}");
                return;
            }
        };
        for task in &tasks {
            let Some(location) = &task.location else {
                continue;
            };
            let distance = haversine_meters(
                position.latitude,
                position.longitude,
                location.latitude,
                location.longitude,
            );
            // The geofence boundary is inclusive.
            if distance > location.radius_meters {
                continue;
            }
            if let Err(e) = self.delivery.offer(task, TriggerKind::Location, now) {
                warn!(task = %task.id, "skipping task after store error: {e}");
            }
        }
    }
}
