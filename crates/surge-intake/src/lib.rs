//! surge-intake — request intake and scheduling.
//!
//! Turns a caller's scaling request into a persisted ledger row plus an
//! armed one-shot trigger. The submit path is ordered so that nothing
//! is persisted until the input is valid and both collaborators have
//! answered: validation failures leave no trace at all, and a trigger
//! that cannot be armed marks the already-written row `failed` rather
//! than deleting it.
//!
//! Error kinds stay distinct end to end: [`IntakeError::Validation`]
//! means the caller's input was bad and retrying the same request is
//! pointless; [`IntakeError::Infrastructure`] means a collaborator was
//! unreachable and the same request may succeed later.

pub mod error;
pub mod service;

pub use error::{IntakeError, IntakeResult};
pub use service::{rule_id, IntakeService, NewScalingRequest, SubmitReceipt};
