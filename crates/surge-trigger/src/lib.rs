//! surge-trigger — the one-shot trigger subsystem.
//!
//! Arms in-process timers that fire exactly once at a scheduled time and
//! hand a payload to a registered handler. Rule ids are caller-chosen;
//! re-registering an id replaces the pending timer instead of stacking a
//! second one, so a duplicate submission for the same request can never
//! fire twice.
//!
//! Past-due fire times fire immediately. Precision is one second, well
//! inside the minute-level granularity the scheduling contract asks for.

pub mod error;
pub mod scheduler;

pub use error::{TriggerError, TriggerResult};
pub use scheduler::{TriggerHandler, TriggerScheduler};
