//! Error types for trigger registration.

use thiserror::Error;

pub type TriggerResult<T> = Result<T, TriggerError>;

#[derive(Debug, Error)]
pub enum TriggerError {
    /// The scheduler has been shut down; no new triggers are accepted.
    #[error("trigger scheduler is shut down")]
    ShutDown,
}
