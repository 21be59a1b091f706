//! Orchestration-platform client trait and the in-memory implementation.
//!
//! [`PlatformClient`] is object-safe (boxed-future methods) so components
//! can hold `Arc<dyn PlatformClient>` and tests can swap in fakes.
//! [`InMemoryPlatform`] is the fake: a service table with a configurable
//! convergence lag, so settle-polling behaves like a real platform that
//! takes a few observations to reach its desired count.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};

/// Boxed future alias for platform call results.
pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = PlatformResult<T>> + Send + 'a>>;

/// A service's replica counts as the platform reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCounts {
    /// The count the service is configured to run.
    pub desired_count: u32,
    /// Replicas currently active.
    pub running_count: u32,
}

/// Narrow interface to the orchestration platform — injected for
/// testability, constructed once by the daemon.
pub trait PlatformClient: Send + Sync {
    /// Snapshot the service's current desired and running counts.
    fn describe_service<'a>(
        &'a self,
        cluster_ref: &'a str,
        service_ref: &'a str,
    ) -> PlatformFuture<'a, ServiceCounts>;

    /// Set the service's desired replica count. The platform converges
    /// asynchronously; callers observe progress through
    /// [`PlatformClient::describe_service`].
    fn update_service<'a>(
        &'a self,
        cluster_ref: &'a str,
        service_ref: &'a str,
        desired_count: u32,
    ) -> PlatformFuture<'a, ()>;
}

// ── In-memory platform ────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ServiceEntry {
    desired: u32,
    running: u32,
    /// Describes left before `running` snaps to `desired`.
    stale_describes: u32,
}

#[derive(Debug, Default)]
struct Inner {
    services: HashMap<(String, String), ServiceEntry>,
    /// Pending injected describe failures.
    describe_faults: u32,
    /// Pending injected update failures.
    update_faults: u32,
}

/// In-process platform fake backing standalone mode and unit tests.
///
/// After an update, the next `settle_after` describes still report the
/// previous running count; the one after that observes convergence. With
/// `settle_after = 0` updates converge immediately. Transient faults can
/// be queued with [`InMemoryPlatform::fail_next_describes`] /
/// [`InMemoryPlatform::fail_next_updates`].
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    inner: Mutex<Inner>,
    settle_after: u32,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of describes that keep observing the stale running count
    /// after each update.
    pub fn with_settle_after(mut self, settle_after: u32) -> Self {
        self.settle_after = settle_after;
        self
    }

    /// Seed a service the platform knows about.
    pub fn register_service(&self, cluster_ref: &str, service_ref: &str, desired: u32) {
        self.lock().services.insert(
            (cluster_ref.to_string(), service_ref.to_string()),
            ServiceEntry {
                desired,
                running: desired,
                stale_describes: 0,
            },
        );
    }

    /// Queue `n` describe calls to fail with a transient error.
    pub fn fail_next_describes(&self, n: u32) {
        self.lock().describe_faults = n;
    }

    /// Queue `n` update calls to fail with a transient error.
    pub fn fail_next_updates(&self, n: u32) {
        self.lock().update_faults = n;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(cluster_ref: &str, service_ref: &str) -> PlatformError {
        PlatformError::ServiceNotFound {
            cluster_ref: cluster_ref.to_string(),
            service_ref: service_ref.to_string(),
        }
    }
}

impl PlatformClient for InMemoryPlatform {
    fn describe_service<'a>(
        &'a self,
        cluster_ref: &'a str,
        service_ref: &'a str,
    ) -> PlatformFuture<'a, ServiceCounts> {
        Box::pin(async move {
            let mut inner = self.lock();
            if inner.describe_faults > 0 {
                inner.describe_faults -= 1;
                return Err(PlatformError::Unavailable("injected describe fault".into()));
            }
            let key = (cluster_ref.to_string(), service_ref.to_string());
            let entry = inner
                .services
                .get_mut(&key)
                .ok_or_else(|| Self::not_found(cluster_ref, service_ref))?;
            if entry.running != entry.desired {
                if entry.stale_describes == 0 {
                    entry.running = entry.desired;
                } else {
                    entry.stale_describes -= 1;
                }
            }
            Ok(ServiceCounts {
                desired_count: entry.desired,
                running_count: entry.running,
            })
        })
    }

    fn update_service<'a>(
        &'a self,
        cluster_ref: &'a str,
        service_ref: &'a str,
        desired_count: u32,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            if inner.update_faults > 0 {
                inner.update_faults -= 1;
                return Err(PlatformError::Unavailable("injected update fault".into()));
            }
            let settle_after = self.settle_after;
            let key = (cluster_ref.to_string(), service_ref.to_string());
            let entry = inner
                .services
                .get_mut(&key)
                .ok_or_else(|| Self::not_found(cluster_ref, service_ref))?;
            entry.desired = desired_count;
            if settle_after == 0 {
                entry.running = desired_count;
            } else {
                entry.stale_describes = settle_after;
            }
            debug!(%cluster_ref, %service_ref, desired_count, "in-memory desired count set");
            Ok(())
        })
    }
}
