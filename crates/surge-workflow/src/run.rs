//! A single workflow run — one request driven phase by phase.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use surge_check::{CheckOracle, CheckStatus};
use surge_ledger::{Ledger, RequestStatus, WorkflowJob};
use surge_platform::PlatformClient;

use crate::config::WorkflowConfig;
use crate::error::{WorkflowError, WorkflowResult};

const TIMEOUT_REASON: &str = "timed out waiting for settlement";
const UNREACHABLE_REASON: &str = "platform unreachable during settlement check";

/// Current phase of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowPhase {
    /// Push the desired count up to the scaled target.
    ScaleOut,
    /// Poll until the scaled target is settled.
    CheckOutLoop,
    /// Sit at scaled capacity for the requested window.
    Hold,
    /// Restore the original desired count.
    ScaleIn,
    /// Poll until the restoration is settled.
    CheckInLoop,
    /// Terminal success.
    Completed,
    /// Terminal failure with the recorded reason.
    Failed { reason: String },
}

impl WorkflowPhase {
    /// The phase a run enters for a row persisted at `status`, or `None`
    /// when the row is terminal. A `scaling_out`/`scaling_in` row
    /// re-issues its platform update on resume; the update is
    /// idempotent, so a repeat is harmless.
    pub fn for_status(status: RequestStatus) -> Option<Self> {
        match status {
            RequestStatus::Scheduled | RequestStatus::ScalingOut => Some(Self::ScaleOut),
            RequestStatus::PendingOut => Some(Self::CheckOutLoop),
            RequestStatus::SucceededOut => Some(Self::Hold),
            RequestStatus::ScalingIn => Some(Self::ScaleIn),
            RequestStatus::PendingIn => Some(Self::CheckInLoop),
            RequestStatus::Completed | RequestStatus::Failed => None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The request reached `completed`.
    Completed,
    /// The request reached `failed` with this reason.
    Failed { reason: String },
    /// Shutdown suspended the run before a terminal status; the
    /// persisted row is where a restart resumes from.
    Interrupted,
    /// The row was already terminal; nothing to drive.
    AlreadyTerminal,
}

/// Verdict of one settle loop.
enum SettleVerdict {
    Settled,
    Diverged(String),
    TimedOut,
    Unreachable,
    Interrupted,
}

/// Executes one [`WorkflowJob`] to a terminal status.
///
/// The run owns nothing shared: the ledger row is advanced with
/// compare-and-set writes, so a conflicting writer aborts this run
/// instead of being overwritten.
pub struct WorkflowRun {
    job: WorkflowJob,
    ledger: Ledger,
    platform: Arc<dyn PlatformClient>,
    oracle: CheckOracle,
    config: WorkflowConfig,
    shutdown: watch::Receiver<bool>,
}

impl WorkflowRun {
    pub fn new(
        job: WorkflowJob,
        ledger: Ledger,
        platform: Arc<dyn PlatformClient>,
        config: WorkflowConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let oracle = CheckOracle::new(platform.clone());
        Self {
            job,
            ledger,
            platform,
            oracle,
            config,
            shutdown,
        }
    }

    /// Drive the request from its persisted status to a terminal one.
    pub async fn execute(mut self) -> WorkflowResult<RunOutcome> {
        let record = self
            .ledger
            .get(&self.job.request_id)?
            .ok_or_else(|| WorkflowError::UnknownRequest(self.job.request_id.clone()))?;
        let mut current = record.status;

        let Some(mut phase) = WorkflowPhase::for_status(current) else {
            debug!(
                request_id = %self.job.request_id,
                status = %current,
                "row already terminal, nothing to drive"
            );
            return Ok(RunOutcome::AlreadyTerminal);
        };

        if current != RequestStatus::Scheduled {
            info!(
                request_id = %self.job.request_id,
                status = %current,
                "resuming from persisted status"
            );
        }

        loop {
            phase = match phase {
                WorkflowPhase::ScaleOut => {
                    self.advance_row(&mut current, RequestStatus::ScalingOut, None)?;
                    match self
                        .platform
                        .update_service(
                            &self.job.cluster_ref,
                            &self.job.service_ref,
                            self.job.desired_count,
                        )
                        .await
                    {
                        Ok(()) => {
                            info!(
                                request_id = %self.job.request_id,
                                desired = self.job.desired_count,
                                "scale-out issued"
                            );
                            WorkflowPhase::CheckOutLoop
                        }
                        Err(e) => WorkflowPhase::Failed {
                            reason: format!("scale-out update failed: {e}"),
                        },
                    }
                }

                WorkflowPhase::CheckOutLoop => {
                    let verdict = self
                        .settle(&mut current, self.job.desired_count, RequestStatus::PendingOut)
                        .await?;
                    match verdict {
                        SettleVerdict::Settled => WorkflowPhase::Hold,
                        SettleVerdict::Diverged(reason) => WorkflowPhase::Failed { reason },
                        SettleVerdict::TimedOut => WorkflowPhase::Failed {
                            reason: TIMEOUT_REASON.to_string(),
                        },
                        SettleVerdict::Unreachable => WorkflowPhase::Failed {
                            reason: UNREACHABLE_REASON.to_string(),
                        },
                        SettleVerdict::Interrupted => return Ok(RunOutcome::Interrupted),
                    }
                }

                WorkflowPhase::Hold => {
                    self.advance_row(&mut current, RequestStatus::SucceededOut, None)?;
                    info!(
                        request_id = %self.job.request_id,
                        wait_secs = self.job.wait_time_seconds,
                        "holding at scaled capacity"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(self.job.wait_time_seconds)) => {
                            WorkflowPhase::ScaleIn
                        }
                        _ = self.shutdown.changed() => return Ok(RunOutcome::Interrupted),
                    }
                }

                WorkflowPhase::ScaleIn => {
                    self.advance_row(&mut current, RequestStatus::ScalingIn, None)?;
                    match self
                        .platform
                        .update_service(
                            &self.job.cluster_ref,
                            &self.job.service_ref,
                            self.job.original_desired_count,
                        )
                        .await
                    {
                        Ok(()) => {
                            info!(
                                request_id = %self.job.request_id,
                                desired = self.job.original_desired_count,
                                "scale-in issued"
                            );
                            WorkflowPhase::CheckInLoop
                        }
                        Err(e) => WorkflowPhase::Failed {
                            reason: format!("scale-in update failed: {e}"),
                        },
                    }
                }

                WorkflowPhase::CheckInLoop => {
                    let verdict = self
                        .settle(
                            &mut current,
                            self.job.original_desired_count,
                            RequestStatus::PendingIn,
                        )
                        .await?;
                    match verdict {
                        SettleVerdict::Settled => WorkflowPhase::Completed,
                        SettleVerdict::Diverged(reason) => WorkflowPhase::Failed { reason },
                        SettleVerdict::TimedOut => WorkflowPhase::Failed {
                            reason: TIMEOUT_REASON.to_string(),
                        },
                        SettleVerdict::Unreachable => WorkflowPhase::Failed {
                            reason: UNREACHABLE_REASON.to_string(),
                        },
                        SettleVerdict::Interrupted => return Ok(RunOutcome::Interrupted),
                    }
                }

                WorkflowPhase::Completed => {
                    self.advance_row(&mut current, RequestStatus::Completed, None)?;
                    info!(request_id = %self.job.request_id, "workflow completed");
                    return Ok(RunOutcome::Completed);
                }

                WorkflowPhase::Failed { reason } => {
                    self.ledger.update_status(
                        &self.job.request_id,
                        current,
                        RequestStatus::Failed,
                        Some(&reason),
                    )?;
                    warn!(request_id = %self.job.request_id, %reason, "workflow failed");
                    return Ok(RunOutcome::Failed { reason });
                }
            };
        }
    }

    /// Compare-and-set the row forward. Re-entering the status the row
    /// already holds (restart resume, repeated pending polls) writes
    /// nothing, which keeps the audit trail exact.
    fn advance_row(
        &self,
        current: &mut RequestStatus,
        to: RequestStatus,
        reason: Option<&str>,
    ) -> WorkflowResult<()> {
        if *current == to {
            return Ok(());
        }
        self.ledger
            .update_status(&self.job.request_id, *current, to, reason)?;
        debug!(
            request_id = %self.job.request_id,
            from = %*current,
            to = %to,
            "request advanced"
        );
        *current = to;
        Ok(())
    }

    /// Poll until the service settles at `expected`.
    ///
    /// Business pending observations and transient platform errors are
    /// budgeted separately: a pending service is converging (bounded by
    /// `max_poll_attempts`), an unreachable platform is retried with
    /// doubling backoff (bounded by `max_transient_retries`, reset by
    /// any answered query).
    async fn settle(
        &mut self,
        current: &mut RequestStatus,
        expected: u32,
        pending_status: RequestStatus,
    ) -> WorkflowResult<SettleVerdict> {
        let mut pending_polls: u32 = 0;
        let mut transient: u32 = 0;
        let mut backoff = self.config.retry_base;

        loop {
            match self
                .oracle
                .check(&self.job.cluster_ref, &self.job.service_ref, expected)
                .await
            {
                Ok(result) => {
                    transient = 0;
                    backoff = self.config.retry_base;
                    match result.status {
                        CheckStatus::Succeeded => return Ok(SettleVerdict::Settled),
                        CheckStatus::Failed => return Ok(SettleVerdict::Diverged(result.message)),
                        CheckStatus::Pending => {
                            self.advance_row(current, pending_status, Some(&result.message))?;
                            pending_polls += 1;
                            if pending_polls >= self.config.max_poll_attempts {
                                warn!(
                                    request_id = %self.job.request_id,
                                    polls = pending_polls,
                                    expected,
                                    "settle budget exhausted"
                                );
                                return Ok(SettleVerdict::TimedOut);
                            }
                            tokio::select! {
                                _ = tokio::time::sleep(self.config.poll_interval) => {}
                                _ = self.shutdown.changed() => return Ok(SettleVerdict::Interrupted),
                            }
                        }
                    }
                }
                Err(e) => {
                    transient += 1;
                    if transient >= self.config.max_transient_retries {
                        warn!(
                            request_id = %self.job.request_id,
                            error = %e,
                            retries = transient,
                            "platform unreachable, giving up"
                        );
                        return Ok(SettleVerdict::Unreachable);
                    }
                    debug!(
                        request_id = %self.job.request_id,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "settlement check failed, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = self.shutdown.changed() => return Ok(SettleVerdict::Interrupted),
                    }
                    backoff = (backoff * 2).min(self.config.retry_max);
                }
            }
        }
    }
}
