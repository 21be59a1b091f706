//! surge-check — the check oracle.
//!
//! Classifies a service's observed replica counts against an expected
//! desired count. Stateless: every check queries the platform fresh and
//! produces a transient [`CheckResult`], never a persisted record.
//!
//! The classification is deliberately strict about *whose* count moved:
//! a desired count that no longer matches the expectation means someone
//! else changed the service (external interference) and is a terminal
//! `FAILED`, while a running count still catching up to the desired
//! count is ordinary convergence and reports `PENDING`. Platform query
//! errors are not outcomes at all — they surface as
//! [`surge_platform::PlatformError`] and the caller decides whether to
//! retry.

pub mod oracle;

pub use oracle::{classify, CheckOracle, CheckResult, CheckStatus};
