//! Notification capability and best-effort dispatcher.
//!
//! Delivery is never load-bearing: the platform may refuse permission or
//! fail mid-call, and the schedulers must keep running regardless. The
//! dispatcher therefore swallows every delivery failure after logging it;
//! callers get no confirmation and must not depend on one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TodoError};

/// Which scheduler asked for a notification.
///
/// Each kind keeps its own cooldown clock on the task record, so a due
/// alert can never suppress a location alert or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fired by the due-time scheduler.
    Due,
    /// Fired by the location scheduler.
    Location,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Due => write!(f, "due"),
            Self::Location => write!(f, "location"),
        }
    }
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// The user granted notification delivery.
    Granted,
    /// The user denied notification delivery.
    Denied,
}

/// Platform alert-presentation capability.
pub trait NotifyCapability: Send + Sync {
    /// Whether the platform can present notifications at all.
    fn is_available(&self) -> bool;

    /// Ask the user for permission to present notifications.
    fn request_permission(&self) -> PermissionState;

    /// Present one notification. May fail; the dispatcher catches.
    fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Best-effort wrapper around a [`NotifyCapability`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<dyn NotifyCapability>,
}

impl NotificationDispatcher {
    /// Wrap a capability.
    #[must_use]
    pub fn new(capability: Arc<dyn NotifyCapability>) -> Self {
        Self { inner: capability }
    }

    /// Whether the underlying capability is present.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    /// Ask the user for permission.
    #[must_use]
    pub fn request_permission(&self) -> PermissionState {
        self.inner.request_permission()
    }

    /// Present a notification, swallowing any delivery failure.
    pub fn dispatch(&self, title: &str, body: &str) {
        match self.inner.show(title, body) {
            Ok(()) => debug!(title, "notification dispatched"),
            Err(e) => warn!(title, "notification delivery failed: {e}"),
        }
    }
}

/// Console-backed capability for headless hosts: always available, grants
/// permission, and presents by logging.
pub struct ConsoleNotifier;

impl NotifyCapability for ConsoleNotifier {
    fn is_available(&self) -> bool {
        true
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!(title, body, "notification");
        Ok(())
    }
}

/// Stub capability for platforms without notification support.
pub struct UnavailableNotifier;

impl NotifyCapability for UnavailableNotifier {
    fn is_available(&self) -> bool {
        false
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    fn show(&self, _title: &str, _body: &str) -> Result<()> {
        Err(TodoError::Notify("notifications unavailable".to_owned()))
    }
}
