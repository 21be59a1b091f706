//! Error types for platform and configuration access.

use thiserror::Error;

/// Result alias for orchestration-platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors from the orchestration platform.
///
/// [`PlatformError::Unavailable`] is transient by contract: callers decide
/// whether to retry. It is never a business outcome — a settle-poll that
/// cannot reach the platform is not the same as a settle-poll that observed
/// a divergence.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The platform does not know the target service.
    #[error("service not found: {cluster_ref}/{service_ref}")]
    ServiceNotFound {
        cluster_ref: String,
        service_ref: String,
    },

    /// The platform could not be reached, timed out, or answered malformed.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for configuration lookups.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from the configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration key not found: {0}")]
    Missing(String),

    #[error("configuration source unreadable: {0}")]
    Unreadable(String),
}
