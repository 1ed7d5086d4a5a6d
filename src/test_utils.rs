//! Shared test utilities used across multiple test modules.

use std::sync::Mutex;

use crate::error::Result;
use crate::notify::{NotifyCapability, PermissionState};

/// Capability that records every delivery instead of presenting it.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// Fresh notifier with no recorded deliveries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(title, body)` pairs delivered so far, in order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Number of deliveries so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.deliveries.lock().map(|d| d.len()).unwrap_or(0)
    }
}

impl NotifyCapability for RecordingNotifier {
    fn is_available(&self) -> bool {
        true
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        if let Ok(mut deliveries) = self.deliveries.lock() {
            deliveries.push((title.to_owned(), body.to_owned()));
        }
        Ok(())
    }
}
