//! The intake service — validate, compute, persist, arm.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use surge_ledger::{Ledger, PopularityTier, RequestStatus, ScalingRequest, WorkflowJob};
use surge_platform::config::keys;
use surge_platform::{ConfigStore, PlatformClient};
use surge_trigger::TriggerScheduler;

use crate::error::{IntakeError, IntakeResult};

/// Accepted launch-time spelling, UTC.
const LAUNCH_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
/// Lead time applied when the caller names no launch time.
const DEFAULT_LEAD_SECS: u64 = 180;
/// Hold window applied when the caller names none.
const DEFAULT_WAIT_SECS: u64 = 60;
const DEFAULT_TEAM: &str = "Unspecified";

/// A caller's scaling request, before validation. Every field is
/// optional except the tier being *meaningful* — an unknown or missing
/// tier is not an error, it just maps to the smallest target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScalingRequest {
    pub team: Option<String>,
    /// `YYYYMMDDHHMMSS`, UTC. Absent means "soon" (now + 3 minutes).
    pub launch_time: Option<String>,
    pub popularity_tier: Option<String>,
    pub wait_time_seconds: Option<u64>,
}

/// What the caller gets back from a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub request_id: String,
    pub scheduled_at: u64,
    pub desired_count: u32,
}

/// Trigger rule id for a request. Derived, not random, so re-arming the
/// same request always lands on the same rule.
pub fn rule_id(request_id: &str) -> String {
    format!("fire-{request_id}")
}

/// Validates scaling requests, persists them, and arms their triggers.
pub struct IntakeService {
    ledger: Ledger,
    platform: Arc<dyn PlatformClient>,
    config: Arc<dyn ConfigStore>,
    trigger: Arc<TriggerScheduler<WorkflowJob>>,
}

impl IntakeService {
    pub fn new(
        ledger: Ledger,
        platform: Arc<dyn PlatformClient>,
        config: Arc<dyn ConfigStore>,
        trigger: Arc<TriggerScheduler<WorkflowJob>>,
    ) -> Self {
        Self {
            ledger,
            platform,
            config,
            trigger,
        }
    }

    /// Accept one scaling request.
    ///
    /// Ordering matters: validation runs before any side effect, the
    /// target snapshot is taken before the row is written, and the
    /// trigger is armed last. A trigger that cannot be armed leaves the
    /// row behind marked `failed` — rows are never deleted.
    pub async fn submit(&self, request: NewScalingRequest) -> IntakeResult<SubmitReceipt> {
        let scheduled_at = resolve_schedule(request.launch_time.as_deref())?;

        let tier = request
            .popularity_tier
            .as_deref()
            .map(PopularityTier::parse)
            .unwrap_or(PopularityTier::Other);
        let team = request.team.unwrap_or_else(|| DEFAULT_TEAM.to_string());
        let wait_time_seconds = request.wait_time_seconds.unwrap_or(DEFAULT_WAIT_SECS);

        let cluster_ref = self.resolve(keys::CLUSTER_REF)?;
        let service_ref = self.resolve(keys::SERVICE_REF)?;

        // Snapshot the restoration target once; it is never recomputed.
        let counts = self
            .platform
            .describe_service(&cluster_ref, &service_ref)
            .await
            .map_err(|e| IntakeError::Infrastructure(format!("orchestration platform: {e}")))?;

        let request_id = format!("sr-{}", Uuid::new_v4());
        let record = ScalingRequest::new(
            &request_id,
            team,
            tier,
            counts.desired_count,
            wait_time_seconds,
            scheduled_at,
            &cluster_ref,
            &service_ref,
        );
        self.ledger
            .create(&record)
            .map_err(|e| IntakeError::Infrastructure(format!("ledger: {e}")))?;

        if let Err(e) = self
            .trigger
            .register_one_shot(&rule_id(&request_id), scheduled_at, record.job())
            .await
        {
            let reason = format!("could not arm trigger: {e}");
            warn!(%request_id, %reason, "submission failed after row creation");
            if let Err(mark_err) = self.ledger.update_status(
                &request_id,
                RequestStatus::Scheduled,
                RequestStatus::Failed,
                Some(&reason),
            ) {
                error!(%request_id, error = %mark_err, "could not mark failed row");
            }
            return Err(IntakeError::Infrastructure(format!("trigger subsystem: {e}")));
        }

        info!(
            %request_id,
            team = %record.team,
            tier = ?record.popularity_tier,
            desired = record.desired_count,
            original = record.original_desired_count,
            scheduled_at,
            "scaling request accepted"
        );

        Ok(SubmitReceipt {
            request_id,
            scheduled_at,
            desired_count: record.desired_count,
        })
    }

    /// Re-arm triggers for rows still waiting to fire.
    ///
    /// Runs at daemon startup. Rows already past their fire time fire
    /// immediately; rows already in flight are the engine's to resume.
    pub async fn rearm_scheduled(&self) -> IntakeResult<usize> {
        let mut rearmed = 0;
        for record in self
            .ledger
            .list()
            .map_err(|e| IntakeError::Infrastructure(format!("ledger: {e}")))?
        {
            if record.status != RequestStatus::Scheduled {
                continue;
            }
            self.trigger
                .register_one_shot(
                    &rule_id(&record.request_id),
                    record.scheduled_at,
                    record.job(),
                )
                .await
                .map_err(|e| IntakeError::Infrastructure(format!("trigger subsystem: {e}")))?;
            rearmed += 1;
        }
        Ok(rearmed)
    }

    fn resolve(&self, name: &str) -> IntakeResult<String> {
        self.config
            .get(name)
            .map_err(|e| IntakeError::Infrastructure(format!("configuration store: {e}")))
    }
}

/// Compute the fire time: the parsed launch time when given, otherwise
/// now plus the default lead. A malformed or non-future launch time is
/// the caller's mistake, not an infrastructure problem.
fn resolve_schedule(launch_time: Option<&str>) -> IntakeResult<u64> {
    let now = Utc::now().timestamp();
    match launch_time {
        None => Ok(now as u64 + DEFAULT_LEAD_SECS),
        Some(raw) => {
            let parsed = NaiveDateTime::parse_from_str(raw, LAUNCH_TIME_FORMAT).map_err(|_| {
                IntakeError::Validation(format!(
                    "launch time {raw:?} does not match YYYYMMDDHHMMSS"
                ))
            })?;
            let at = parsed.and_utc().timestamp();
            if at <= now {
                return Err(IntakeError::Validation(
                    "launch time must be in the future".to_string(),
                ));
            }
            Ok(at as u64)
        }
    }
}
