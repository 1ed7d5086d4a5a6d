//! Configuration types for the scheduling core.

use crate::error::{Result, TodoError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the scheduling core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Notification channel toggles.
    pub notifications: NotificationConfig,
    /// Due-time scheduler settings.
    pub due: DueSchedulerConfig,
    /// Location scheduler settings.
    pub location: LocationSchedulerConfig,
}

/// Notification channel toggles.
///
/// These mirror the per-user settings the UI exposes; a disabled channel
/// never starts, even when the platform capability is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether due-time notifications are enabled.
    pub enable_time_notifications: bool,
    /// Whether location notifications are enabled.
    pub enable_location_notifications: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enable_time_notifications: true,
            enable_location_notifications: false,
        }
    }
}

/// Due-time scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DueSchedulerConfig {
    /// Seconds between due scans.
    pub tick_interval_secs: u64,
    /// Cooldown in seconds before a task may re-notify for the due trigger.
    ///
    /// Matches the tick interval so a persistently overdue task notifies at
    /// most once per scan.
    pub cooldown_secs: i64,
}

impl Default for DueSchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            cooldown_secs: 60,
        }
    }
}

/// Location scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSchedulerConfig {
    /// Cooldown in seconds before a task may re-notify for the location
    /// trigger. Longer than the due cooldown because geofence re-entry is
    /// frequent.
    pub cooldown_secs: i64,
}

impl Default for LocationSchedulerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30 * 60,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)?;
        toml::from_str(&body).map_err(|e| TodoError::Config(format!("cannot parse config: {e}")))
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string_pretty(self)
            .map_err(|e| TodoError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Default config file path (`<config dir>/minitodo/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("minitodo").join("config.toml"))
    }
}
