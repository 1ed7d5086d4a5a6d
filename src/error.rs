//! Error types for the minitodo scheduling core.

/// Top-level error type for the task-scheduling system.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// Recurrence rule construction or evaluation error.
    #[error("recurrence error: {0}")]
    Recurrence(String),

    /// Task store read/write error.
    #[error("store error: {0}")]
    Store(String),

    /// Notification capability or delivery error.
    #[error("notify error: {0}")]
    Notify(String),

    /// Geolocation capability error.
    #[error("geo error: {0}")]
    Geo(String),

    /// Scheduler lifecycle or loop error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TodoError>;
