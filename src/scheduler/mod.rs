//! Background notification schedulers.
//!
//! Two producers feed one delivery path: the due-time scheduler polls on a
//! fixed interval, the location scheduler reacts to pushed position
//! updates. Both are owned by the [`SchedulerSupervisor`], the idempotent
//! once-per-process entrypoint the UI layer calls.

pub(crate) mod delivery;
pub(crate) mod due;
pub(crate) mod location;
pub mod supervisor;

pub use supervisor::{SchedulerSupervisor, StartSummary};
