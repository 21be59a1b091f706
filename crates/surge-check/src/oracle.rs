//! Check classification and the platform-querying oracle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use surge_platform::{PlatformClient, PlatformResult, ServiceCounts};

/// Outcome of one settlement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// Counts match the expectation and each other.
    Succeeded,
    /// Desired count matches but replicas are still converging.
    Pending,
    /// Desired count diverged from the expectation.
    Failed,
}

/// Transient result of one check; produced fresh on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    fn new(status: CheckStatus, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

/// Classify observed counts against an expected desired count.
///
/// The order matters: divergence of the desired count is checked first,
/// so interference is never misread as convergence-in-progress.
pub fn classify(counts: ServiceCounts, expected_desired_count: u32) -> CheckResult {
    if counts.desired_count != expected_desired_count {
        CheckResult::new(CheckStatus::Failed, "desired count diverged from expectation")
    } else if counts.running_count != counts.desired_count {
        CheckResult::new(CheckStatus::Pending, "scaling in progress")
    } else {
        CheckResult::new(CheckStatus::Succeeded, "replica counts settled")
    }
}

/// Queries the platform and classifies the answer.
#[derive(Clone)]
pub struct CheckOracle {
    platform: Arc<dyn PlatformClient>,
}

impl CheckOracle {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }

    /// One settlement check. Query errors propagate untouched; only an
    /// answered query produces a [`CheckResult`].
    pub async fn check(
        &self,
        cluster_ref: &str,
        service_ref: &str,
        expected_desired_count: u32,
    ) -> PlatformResult<CheckResult> {
        let counts = self.platform.describe_service(cluster_ref, service_ref).await?;
        let result = classify(counts, expected_desired_count);
        debug!(
            %cluster_ref,
            %service_ref,
            expected = expected_desired_count,
            desired = counts.desired_count,
            running = counts.running_count,
            status = ?result.status,
            "settlement check"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_platform::{InMemoryPlatform, PlatformError};

    fn counts(desired: u32, running: u32) -> ServiceCounts {
        ServiceCounts {
            desired_count: desired,
            running_count: running,
        }
    }

    #[test]
    fn matching_counts_succeed() {
        let result = classify(counts(3, 3), 3);
        assert_eq!(result.status, CheckStatus::Succeeded);
        assert_eq!(result.message, "replica counts settled");
    }

    #[test]
    fn converging_counts_are_pending() {
        let result = classify(counts(3, 1), 3);
        assert_eq!(result.status, CheckStatus::Pending);
        assert_eq!(result.message, "scaling in progress");
    }

    #[test]
    fn diverged_desired_count_fails() {
        let result = classify(counts(2, 2), 3);
        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.message, "desired count diverged from expectation");
    }

    #[test]
    fn divergence_wins_over_convergence() {
        // Desired moved away AND replicas are catching up: interference.
        let result = classify(counts(2, 1), 3);
        assert_eq!(result.status, CheckStatus::Failed);
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&CheckStatus::Succeeded).unwrap(),
            "\"SUCCEEDED\""
        );
        assert_eq!(
            serde_json::to_string(&CheckStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&CheckStatus::Failed).unwrap(),
            "\"FAILED\""
        );
    }

    #[tokio::test]
    async fn oracle_observes_convergence() {
        let platform = InMemoryPlatform::new().with_settle_after(1);
        platform.register_service("cluster-a", "svc-checkout", 1);
        let platform = Arc::new(platform);
        let oracle = CheckOracle::new(platform.clone());

        platform.update_service("cluster-a", "svc-checkout", 3).await.unwrap();

        let first = oracle.check("cluster-a", "svc-checkout", 3).await.unwrap();
        assert_eq!(first.status, CheckStatus::Pending);

        let second = oracle.check("cluster-a", "svc-checkout", 3).await.unwrap();
        assert_eq!(second.status, CheckStatus::Succeeded);
    }

    #[tokio::test]
    async fn oracle_reports_interference() {
        let platform = InMemoryPlatform::new();
        platform.register_service("cluster-a", "svc-checkout", 2);
        let oracle = CheckOracle::new(Arc::new(platform));

        let result = oracle.check("cluster-a", "svc-checkout", 3).await.unwrap();
        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.message, "desired count diverged from expectation");
    }

    #[tokio::test]
    async fn query_errors_are_not_outcomes() {
        let platform = InMemoryPlatform::new();
        platform.register_service("cluster-a", "svc-checkout", 1);
        platform.fail_next_describes(1);
        let oracle = CheckOracle::new(Arc::new(platform));

        let err = oracle.check("cluster-a", "svc-checkout", 1).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unavailable(_)));
    }
}
