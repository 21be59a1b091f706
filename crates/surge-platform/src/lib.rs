//! surge-platform — narrow interfaces to Surge's external collaborators.
//!
//! Two collaborators live behind traits here so every other crate stays
//! decoupled from where capacity actually runs:
//!
//! - [`PlatformClient`] — the orchestration platform that owns services:
//!   `describe_service` (desired/running replica counts) and
//!   `update_service` (set the desired count). Implementations:
//!   [`InMemoryPlatform`] for tests and standalone mode, [`HttpPlatform`]
//!   for a remote control plane.
//! - [`ConfigStore`] — runtime name→value resolution for the target
//!   cluster/service references and the ledger location, so redeploying
//!   infrastructure never means redeploying workflow code.
//!   Implementations: [`MemoryConfigStore`], [`FileConfigStore`].
//!
//! Clients are constructed once by the daemon and injected as
//! `Arc<dyn PlatformClient>` / `Arc<dyn ConfigStore>`; nothing in this
//! workspace reaches for an ambient global.

pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use client::{InMemoryPlatform, PlatformClient, PlatformFuture, ServiceCounts};
pub use config::{ConfigStore, FileConfigStore, MemoryConfigStore};
pub use error::{ConfigError, ConfigResult, PlatformError, PlatformResult};
pub use http::HttpPlatform;
