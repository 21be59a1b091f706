//! Error types for request intake.

use thiserror::Error;

pub type IntakeResult<T> = Result<T, IntakeError>;

#[derive(Debug, Error)]
pub enum IntakeError {
    /// Bad caller input. Fails fast, persists nothing, never worth
    /// retrying unchanged.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A collaborator (configuration store, platform, trigger) was
    /// unreachable. Transient; the caller may retry.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}
