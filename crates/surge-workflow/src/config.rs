//! Workflow tuning knobs.

use std::time::Duration;

/// Bounds and intervals for one workflow run.
///
/// The two counters are deliberately separate: `max_poll_attempts` caps
/// how long a service may keep *converging* (a business outcome),
/// `max_transient_retries` caps how long the platform may stay
/// *unreachable* (an infrastructure outcome). A successful query resets
/// the transient counter and its backoff.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Wait between settle polls.
    pub poll_interval: Duration,
    /// Pending observations allowed per settle loop before the run
    /// fails with a settlement timeout.
    pub max_poll_attempts: u32,
    /// First backoff after a transient platform error.
    pub retry_base: Duration,
    /// Backoff ceiling; doubling stops here.
    pub retry_max: Duration,
    /// Consecutive transient errors allowed before the run fails.
    pub max_transient_retries: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: 60,
            retry_base: Duration::from_secs(1),
            retry_max: Duration::from_secs(60),
            max_transient_retries: 5,
        }
    }
}
