//! One-shot trigger scheduler — a timer task per armed rule.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{TriggerError, TriggerResult};

/// Handler invoked when a trigger fires, receiving the armed payload.
pub type TriggerHandler<P> = Arc<dyn Fn(P) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Per-rule timer state.
struct TriggerSlot {
    /// Handle to the timer task.
    handle: JoinHandle<()>,
    /// Shutdown signal for this timer.
    shutdown_tx: watch::Sender<bool>,
}

/// Tracks armed one-shot triggers and fires each exactly once.
pub struct TriggerScheduler<P> {
    handler: TriggerHandler<P>,
    /// Armed timers: rule_id → slot. A slot removes itself when it fires.
    triggers: Arc<RwLock<HashMap<String, TriggerSlot>>>,
    closed: AtomicBool,
}

impl<P: Send + 'static> TriggerScheduler<P> {
    pub fn new(handler: TriggerHandler<P>) -> Self {
        Self {
            handler,
            triggers: Arc::new(RwLock::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Arm a trigger that fires once at `fire_at_epoch` (unix seconds).
    ///
    /// A past-due fire time fires immediately. Re-registering an existing
    /// `rule_id` replaces the pending timer.
    pub async fn register_one_shot(
        &self,
        rule_id: &str,
        fire_at_epoch: u64,
        payload: P,
    ) -> TriggerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TriggerError::ShutDown);
        }

        let delay = Duration::from_secs(fire_at_epoch.saturating_sub(epoch_secs()));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let rule_id_owned = rule_id.to_string();
        let handler = self.handler.clone();
        let triggers = self.triggers.clone();

        // The write lock is held through the insert below; a past-due
        // timer can only remove its slot after that insert has happened.
        let mut slots = self.triggers.write().await;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    // Fired: the rule is no longer pending, then the
                    // payload is handed off.
                    triggers.write().await.remove(&rule_id_owned);
                    debug!(rule_id = %rule_id_owned, "trigger fired");
                    (handler)(payload).await;
                }
                _ = shutdown_rx.changed() => {
                    debug!(rule_id = %rule_id_owned, "trigger cancelled before firing");
                }
            }
        });

        if let Some(old) = slots.insert(
            rule_id.to_string(),
            TriggerSlot {
                handle,
                shutdown_tx,
            },
        ) {
            // Replace the pending timer for this rule.
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
            debug!(%rule_id, "pending trigger replaced");
        }

        info!(%rule_id, fire_at_epoch, delay_secs = delay.as_secs(), "trigger armed");
        Ok(())
    }

    /// Cancel a pending trigger. Returns whether one was pending.
    pub async fn cancel(&self, rule_id: &str) -> bool {
        let mut triggers = self.triggers.write().await;
        if let Some(slot) = triggers.remove(rule_id) {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            info!(%rule_id, "trigger cancelled");
            true
        } else {
            false
        }
    }

    /// Rule ids of triggers armed but not yet fired.
    pub async fn pending(&self) -> Vec<String> {
        let triggers = self.triggers.read().await;
        triggers.keys().cloned().collect()
    }

    /// Whether a rule is armed and waiting.
    pub async fn is_pending(&self, rule_id: &str) -> bool {
        let triggers = self.triggers.read().await;
        triggers.contains_key(rule_id)
    }

    /// Cancel every pending trigger and refuse further registrations.
    pub async fn shutdown_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut triggers = self.triggers.write().await;
        for (rule_id, slot) in triggers.drain() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            debug!(%rule_id, "trigger cancelled at shutdown");
        }
        info!("trigger scheduler shut down");
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
