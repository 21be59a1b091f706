//! Workflow engine — one background task per in-flight request.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use surge_ledger::{Ledger, RequestStatus, WorkflowJob};
use surge_platform::PlatformClient;

use crate::config::WorkflowConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::run::{RunOutcome, WorkflowRun};

/// Per-request run state.
struct RunSlot {
    /// Handle to the run task.
    handle: JoinHandle<()>,
    /// Shutdown signal for this run.
    shutdown_tx: watch::Sender<bool>,
}

/// Tracks active workflow runs and enforces one run per request.
pub struct WorkflowEngine {
    ledger: Ledger,
    platform: Arc<dyn PlatformClient>,
    config: WorkflowConfig,
    /// Active runs: request_id → slot. A run removes its own slot when
    /// it finishes.
    runs: Arc<RwLock<HashMap<String, RunSlot>>>,
}

impl WorkflowEngine {
    pub fn new(ledger: Ledger, platform: Arc<dyn PlatformClient>, config: WorkflowConfig) -> Self {
        Self {
            ledger,
            platform,
            config,
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a run for `job`. Refused while a run for the same request
    /// is active, so a double-fired trigger cannot produce two
    /// concurrent runs.
    pub async fn start(&self, job: WorkflowJob) -> WorkflowResult<()> {
        // The write lock is held through the insert below; the spawned
        // task can only remove its slot after that insert has happened.
        let mut runs = self.runs.write().await;
        if runs.contains_key(&job.request_id) {
            return Err(WorkflowError::AlreadyActive(job.request_id.clone()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let request_id = job.request_id.clone();
        let run = WorkflowRun::new(
            job,
            self.ledger.clone(),
            self.platform.clone(),
            self.config.clone(),
            shutdown_rx,
        );

        let runs_map = self.runs.clone();
        let id_owned = request_id.clone();
        let handle = tokio::spawn(async move {
            let outcome = run.execute().await;
            runs_map.write().await.remove(&id_owned);
            match outcome {
                Ok(RunOutcome::Completed) => {
                    info!(request_id = %id_owned, "workflow run finished: completed")
                }
                Ok(RunOutcome::Failed { reason }) => {
                    warn!(request_id = %id_owned, %reason, "workflow run finished: failed")
                }
                Ok(RunOutcome::Interrupted) => {
                    info!(request_id = %id_owned, "workflow run suspended by shutdown")
                }
                Ok(RunOutcome::AlreadyTerminal) => {
                    debug!(request_id = %id_owned, "workflow run had nothing to do")
                }
                Err(e) => {
                    warn!(request_id = %id_owned, error = %e, "workflow run aborted")
                }
            }
        });

        runs.insert(
            request_id.clone(),
            RunSlot {
                handle,
                shutdown_tx,
            },
        );
        info!(%request_id, "workflow run started");
        Ok(())
    }

    /// Restart runs for every row a previous process life left
    /// in flight. `scheduled` rows are not touched here — their trigger
    /// re-arming is the daemon's concern. Returns how many runs were
    /// restarted.
    pub async fn resume_in_flight(&self) -> WorkflowResult<usize> {
        let mut resumed = 0;
        for record in self.ledger.list()? {
            if record.status.is_terminal() || record.status == RequestStatus::Scheduled {
                continue;
            }
            match self.start(record.job()).await {
                Ok(()) => {
                    info!(
                        request_id = %record.request_id,
                        status = %record.status,
                        "in-flight request resumed"
                    );
                    resumed += 1;
                }
                // Already driven; nothing to resume.
                Err(WorkflowError::AlreadyActive(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(resumed)
    }

    /// Request ids with active runs.
    pub async fn active(&self) -> Vec<String> {
        let runs = self.runs.read().await;
        runs.keys().cloned().collect()
    }

    /// Whether a run is currently driving this request.
    pub async fn is_active(&self, request_id: &str) -> bool {
        let runs = self.runs.read().await;
        runs.contains_key(request_id)
    }

    /// Signal every run to suspend and wait for them to wind down.
    /// Runs stop at their next suspension point without writing a
    /// terminal status; the persisted rows carry the resume points.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(String, JoinHandle<()>)> = {
            let mut runs = self.runs.write().await;
            runs.drain()
                .map(|(id, slot)| {
                    let _ = slot.shutdown_tx.send(true);
                    (id, slot.handle)
                })
                .collect()
        };
        for (request_id, handle) in drained {
            let _ = handle.await;
            debug!(%request_id, "workflow run stopped");
        }
        info!("workflow engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use surge_ledger::{PopularityTier, ScalingRequest};
    use surge_platform::InMemoryPlatform;

    const CLUSTER: &str = "cluster-a";
    const SERVICE: &str = "svc-checkout";

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig {
            poll_interval: Duration::from_millis(5),
            max_poll_attempts: 1000,
            retry_base: Duration::from_millis(1),
            retry_max: Duration::from_millis(8),
            max_transient_retries: 5,
        }
    }

    fn test_engine(settle_after: u32) -> (WorkflowEngine, Ledger, Arc<InMemoryPlatform>) {
        let ledger = Ledger::open_in_memory().unwrap();
        let platform = Arc::new(InMemoryPlatform::new().with_settle_after(settle_after));
        platform.register_service(CLUSTER, SERVICE, 1);
        let client: Arc<dyn PlatformClient> = platform.clone();
        let engine = WorkflowEngine::new(ledger.clone(), client, fast_config());
        (engine, ledger, platform)
    }

    fn test_request(id: &str, wait_secs: u64) -> ScalingRequest {
        ScalingRequest::new(
            id,
            "payments",
            PopularityTier::Hot,
            1,
            wait_secs,
            1_900_000_000,
            CLUSTER,
            SERVICE,
        )
    }

    async fn wait_until_inactive(engine: &WorkflowEngine, id: &str) {
        for _ in 0..400 {
            if !engine.is_active(id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("run for {id} never finished");
    }

    #[tokio::test]
    async fn run_completes_and_clears_its_slot() {
        let (engine, ledger, _platform) = test_engine(0);
        let record = test_request("sr-1", 0);
        ledger.create(&record).unwrap();

        engine.start(record.job()).await.unwrap();
        wait_until_inactive(&engine, "sr-1").await;

        assert_eq!(
            ledger.get("sr-1").unwrap().unwrap().status,
            RequestStatus::Completed
        );
        assert!(engine.active().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_start_is_refused() {
        // A hold long enough to keep the first run active.
        let (engine, ledger, _platform) = test_engine(0);
        let record = test_request("sr-1", 3600);
        ledger.create(&record).unwrap();

        engine.start(record.job()).await.unwrap();
        let err = engine.start(record.job()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyActive(id) if id == "sr-1"));

        engine.shutdown_all().await;
    }

    #[tokio::test]
    async fn resume_restarts_only_in_flight_rows() {
        let (engine, ledger, _platform) = test_engine(0);

        // scheduled: the daemon's trigger concern, not the engine's.
        ledger.create(&test_request("sr-scheduled", 0)).unwrap();

        // in flight: resumes and completes.
        let inflight = test_request("sr-inflight", 0);
        ledger.create(&inflight).unwrap();
        ledger
            .update_status("sr-inflight", RequestStatus::Scheduled, RequestStatus::ScalingOut, None)
            .unwrap();

        // terminal: ignored.
        let done = test_request("sr-done", 0);
        ledger.create(&done).unwrap();
        ledger
            .update_status("sr-done", RequestStatus::Scheduled, RequestStatus::Failed, Some("x"))
            .unwrap();

        let resumed = engine.resume_in_flight().await.unwrap();
        assert_eq!(resumed, 1);

        wait_until_inactive(&engine, "sr-inflight").await;
        assert_eq!(
            ledger.get("sr-inflight").unwrap().unwrap().status,
            RequestStatus::Completed
        );
        assert_eq!(
            ledger.get("sr-scheduled").unwrap().unwrap().status,
            RequestStatus::Scheduled
        );
    }

    #[tokio::test]
    async fn shutdown_suspends_active_runs() {
        let (engine, ledger, _platform) = test_engine(0);
        let record = test_request("sr-1", 3600);
        ledger.create(&record).unwrap();
        engine.start(record.job()).await.unwrap();

        // Let the run reach its hold before draining.
        for _ in 0..200 {
            if ledger.get("sr-1").unwrap().unwrap().status == RequestStatus::SucceededOut {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        engine.shutdown_all().await;

        assert!(engine.active().await.is_empty());
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert!(!stored.status.is_terminal());
    }

    #[tokio::test]
    async fn terminal_row_start_is_harmless() {
        let (engine, ledger, _platform) = test_engine(0);
        let record = test_request("sr-1", 0);
        ledger.create(&record).unwrap();
        ledger
            .update_status("sr-1", RequestStatus::Scheduled, RequestStatus::Failed, Some("x"))
            .unwrap();

        engine.start(record.job()).await.unwrap();
        wait_until_inactive(&engine, "sr-1").await;

        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Failed);
        assert_eq!(stored.transitions.len(), 2);
    }
}
