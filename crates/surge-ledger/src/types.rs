//! Domain types for the scaling-request ledger.
//!
//! These types represent the persisted lifecycle of a scheduled scaling
//! request plus the trigger payload that starts its workflow. Persisted
//! records serialize with camelCase keys (the wire and storage shape);
//! statuses are closed enums so an illegal lifecycle state cannot be
//! represented.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unique identifier for a scaling request.
pub type RequestId = String;

// ── Popularity tier ───────────────────────────────────────────────

/// Categorical popularity of the event driving the capacity change.
///
/// The tier is the only input to the replica target: hot→3, medium→2,
/// cold→1, anything unrecognized→1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopularityTier {
    Hot,
    Medium,
    Cold,
    Other,
}

impl PopularityTier {
    /// Parse a free-form label. Unknown labels collapse to [`Self::Other`].
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "hot" => Self::Hot,
            "medium" => Self::Medium,
            "cold" => Self::Cold,
            _ => Self::Other,
        }
    }

    /// The replica target for this tier. Pure mapping, no configuration.
    pub fn desired_count(self) -> u32 {
        match self {
            Self::Hot => 3,
            Self::Medium => 2,
            Self::Cold | Self::Other => 1,
        }
    }
}

// ── Request status ────────────────────────────────────────────────

/// Lifecycle status of a scaling request.
///
/// A request moves strictly forward along
/// `scheduled → scaling_out → pending_out → succeeded_out → scaling_in →
/// pending_in → completed`; `failed` is terminal and reachable from any
/// non-terminal status. [`RequestStatus::rank`] encodes the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Scheduled,
    ScalingOut,
    PendingOut,
    SucceededOut,
    ScalingIn,
    PendingIn,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Position in the monotonic lifecycle order.
    pub fn rank(self) -> u8 {
        match self {
            Self::Scheduled => 0,
            Self::ScalingOut => 1,
            Self::PendingOut => 2,
            Self::SucceededOut => 3,
            Self::ScalingIn => 4,
            Self::PendingIn => 5,
            Self::Completed => 6,
            Self::Failed => 7,
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The persisted/wire spelling of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::ScalingOut => "scaling_out",
            Self::PendingOut => "pending_out",
            Self::SucceededOut => "succeeded_out",
            Self::ScalingIn => "scaling_in",
            Self::PendingIn => "pending_in",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Scaling request ───────────────────────────────────────────────

/// One status transition in a request's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: RequestStatus,
    /// Unix timestamp (seconds) of the transition.
    pub at: u64,
    /// Reason recorded with the transition, if any.
    pub reason: Option<String>,
}

/// Persisted record of a scheduled scaling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingRequest {
    /// Immutable primary key.
    pub request_id: RequestId,
    /// Free-text owner label.
    pub team: String,
    /// Popularity tier the replica target was derived from.
    pub popularity_tier: PopularityTier,
    /// Replica target during the hold window.
    pub desired_count: u32,
    /// Desired count observed at submission; the restoration target.
    /// Captured once, never recomputed.
    pub original_desired_count: u32,
    /// Hold duration between scale-out settling and scale-in.
    pub wait_time_seconds: u64,
    /// Unix timestamp (seconds) at which the workflow fires.
    pub scheduled_at: u64,
    /// Target cluster reference, resolved at submission and frozen.
    pub cluster_ref: String,
    /// Target service reference, resolved at submission and frozen.
    pub service_ref: String,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Reason attached to the latest transition, if any.
    pub status_reason: Option<String>,
    /// Full transition history, oldest first.
    pub transitions: Vec<StatusChange>,
    /// Unix timestamp (seconds) when the row was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at: u64,
}

impl ScalingRequest {
    /// Build a fresh `scheduled` row. The replica target is derived from
    /// the tier here so the two can never disagree.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: impl Into<RequestId>,
        team: impl Into<String>,
        popularity_tier: PopularityTier,
        original_desired_count: u32,
        wait_time_seconds: u64,
        scheduled_at: u64,
        cluster_ref: impl Into<String>,
        service_ref: impl Into<String>,
    ) -> Self {
        let now = epoch_secs();
        Self {
            request_id: request_id.into(),
            team: team.into(),
            popularity_tier,
            desired_count: popularity_tier.desired_count(),
            original_desired_count,
            wait_time_seconds,
            scheduled_at,
            cluster_ref: cluster_ref.into(),
            service_ref: service_ref.into(),
            status: RequestStatus::Scheduled,
            status_reason: None,
            transitions: vec![StatusChange {
                status: RequestStatus::Scheduled,
                at: now,
                reason: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// The trigger payload carrying everything the workflow needs.
    pub fn job(&self) -> WorkflowJob {
        WorkflowJob {
            request_id: self.request_id.clone(),
            cluster_ref: self.cluster_ref.clone(),
            service_ref: self.service_ref.clone(),
            desired_count: self.desired_count,
            original_desired_count: self.original_desired_count,
            wait_time_seconds: self.wait_time_seconds,
        }
    }
}

// ── Workflow job ──────────────────────────────────────────────────

/// Complete payload handed to the trigger subsystem at submission and to
/// the workflow engine when the trigger fires. Self-contained on purpose:
/// the engine never re-derives these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowJob {
    pub request_id: RequestId,
    pub cluster_ref: String,
    pub service_ref: String,
    pub desired_count: u32,
    pub original_desired_count: u32,
    pub wait_time_seconds: u64,
}

impl From<&ScalingRequest> for WorkflowJob {
    fn from(record: &ScalingRequest) -> Self {
        record.job()
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
