//! REST API handlers.
//!
//! The submission and check endpoints speak the caller-facing contract
//! (a `status` plus a `message`); audit reads use the shared response
//! wrapper. Infrastructure detail is logged here and never returned.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::error;

use surge_intake::{IntakeError, NewScalingRequest};
use surge_platform::ConfigResult;
use surge_platform::config::keys;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Submission ─────────────────────────────────────────────────

/// Caller-facing submission outcome.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<u64>,
}

/// POST /api/v1/scaling-requests
pub async fn submit_request(
    State(state): State<ApiState>,
    Json(request): Json<NewScalingRequest>,
) -> impl IntoResponse {
    match state.intake.submit(request).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(SubmissionResponse {
                status: "SUCCEEDED",
                message: "scaling request accepted".to_string(),
                request_id: Some(receipt.request_id),
                scheduled_at: Some(receipt.scheduled_at),
            }),
        )
            .into_response(),
        // Validation text is feedback about the caller's own input.
        Err(IntakeError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(SubmissionResponse {
                status: "FAILED",
                message,
                request_id: None,
                scheduled_at: None,
            }),
        )
            .into_response(),
        Err(IntakeError::Infrastructure(detail)) => {
            error!(%detail, "submission failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(SubmissionResponse {
                    status: "FAILED",
                    message: "submission failed".to_string(),
                    request_id: None,
                    scheduled_at: None,
                }),
            )
                .into_response()
        }
    }
}

// ── Audit ──────────────────────────────────────────────────────

/// GET /api/v1/scaling-requests
pub async fn list_requests(State(state): State<ApiState>) -> impl IntoResponse {
    match state.ledger.list() {
        Ok(rows) => ApiResponse::ok(rows).into_response(),
        Err(e) => {
            error!(error = %e, "ledger listing failed");
            error_response("ledger unavailable", StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /api/v1/scaling-requests/{id}
pub async fn get_request(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.ledger.get(&id) {
        Ok(Some(row)) => ApiResponse::ok(row).into_response(),
        Ok(None) => {
            error_response("scaling request not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => {
            error!(error = %e, %id, "ledger read failed");
            error_response("ledger unavailable", StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

// ── Check ──────────────────────────────────────────────────────

/// Check invocation body. Absent refs resolve through the
/// configuration store, like the intake path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub expected_desired_count: u32,
    pub cluster_ref: Option<String>,
    pub service_ref: Option<String>,
}

fn resolve_coordinates(state: &ApiState, req: &CheckRequest) -> ConfigResult<(String, String)> {
    let cluster_ref = match &req.cluster_ref {
        Some(v) => v.clone(),
        None => state.config.get(keys::CLUSTER_REF)?,
    };
    let service_ref = match &req.service_ref {
        Some(v) => v.clone(),
        None => state.config.get(keys::SERVICE_REF)?,
    };
    Ok((cluster_ref, service_ref))
}

/// POST /api/v1/check
pub async fn run_check(
    State(state): State<ApiState>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let (cluster_ref, service_ref) = match resolve_coordinates(&state, &req) {
        Ok(refs) => refs,
        Err(e) => {
            error!(error = %e, "check could not resolve service coordinates");
            return error_response("configuration unavailable", StatusCode::BAD_GATEWAY)
                .into_response();
        }
    };

    match state
        .oracle
        .check(&cluster_ref, &service_ref, req.expected_desired_count)
        .await
    {
        Ok(result) => Json(result).into_response(),
        // A query error is not a check outcome; it surfaces as a 502.
        Err(e) => {
            error!(error = %e, "check could not reach the platform");
            error_response("platform unreachable", StatusCode::BAD_GATEWAY).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use surge_check::CheckOracle;
    use surge_intake::IntakeService;
    use surge_ledger::{Ledger, WorkflowJob};
    use surge_platform::{ConfigStore, InMemoryPlatform, MemoryConfigStore, PlatformClient};
    use surge_trigger::TriggerScheduler;

    const CLUSTER: &str = "cluster-a";
    const SERVICE: &str = "svc-checkout";

    fn test_state() -> (ApiState, Arc<InMemoryPlatform>) {
        let ledger = Ledger::open_in_memory().unwrap();
        let platform = Arc::new(InMemoryPlatform::new());
        platform.register_service(CLUSTER, SERVICE, 2);
        let config: Arc<dyn ConfigStore> = Arc::new(
            MemoryConfigStore::new()
                .with(keys::CLUSTER_REF, CLUSTER)
                .with(keys::SERVICE_REF, SERVICE),
        );
        let client: Arc<dyn PlatformClient> = platform.clone();
        let trigger: Arc<TriggerScheduler<WorkflowJob>> =
            Arc::new(TriggerScheduler::new(Arc::new(|_job| Box::pin(async {}))));
        let intake = Arc::new(IntakeService::new(
            ledger.clone(),
            client.clone(),
            config.clone(),
            trigger,
        ));
        let state = ApiState {
            intake,
            ledger,
            oracle: CheckOracle::new(client),
            config,
        };
        (state, platform)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn hot_request() -> NewScalingRequest {
        NewScalingRequest {
            team: Some("payments".to_string()),
            launch_time: None,
            popularity_tier: Some("hot".to_string()),
            wait_time_seconds: Some(60),
        }
    }

    #[tokio::test]
    async fn submit_accepts_a_request() {
        let (state, _) = test_state();
        let resp = submit_request(State(state), Json(hot_request())).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "SUCCEEDED");
        assert!(body["requestId"].as_str().unwrap().starts_with("sr-"));
        assert!(body["scheduledAt"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn submit_rejects_malformed_launch_time() {
        let (state, _) = test_state();
        let req = NewScalingRequest {
            launch_time: Some("tomorrow-ish".to_string()),
            ..hot_request()
        };
        let resp = submit_request(State(state), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "FAILED");
        assert!(body["message"].as_str().unwrap().contains("YYYYMMDDHHMMSS"));
    }

    #[tokio::test]
    async fn submit_hides_infrastructure_detail() {
        let (state, platform) = test_state();
        platform.fail_next_describes(1);

        let resp = submit_request(State(state), Json(hot_request())).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "FAILED");
        assert_eq!(body["message"], "submission failed");
    }

    #[tokio::test]
    async fn get_returns_a_submitted_row() {
        let (state, _) = test_state();
        let resp = submit_request(State(state.clone()), Json(hot_request())).await;
        let body = body_json(resp.into_response()).await;
        let id = body["requestId"].as_str().unwrap().to_string();

        let resp = get_request(State(state), Path(id.clone())).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["data"]["requestId"], id.as_str());
        assert_eq!(body["data"]["status"], "scheduled");
    }

    #[tokio::test]
    async fn get_unknown_request_is_not_found() {
        let (state, _) = test_state();
        let resp = get_request(State(state), Path("sr-missing".to_string())).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_all_submissions() {
        let (state, _) = test_state();
        submit_request(State(state.clone()), Json(hot_request())).await;
        submit_request(State(state.clone()), Json(hot_request())).await;

        let resp = list_requests(State(state)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn check_with_explicit_refs_succeeds() {
        let (state, _) = test_state();
        let req = CheckRequest {
            expected_desired_count: 2,
            cluster_ref: Some(CLUSTER.to_string()),
            service_ref: Some(SERVICE.to_string()),
        };
        let resp = run_check(State(state), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "SUCCEEDED");
    }

    #[tokio::test]
    async fn check_resolves_refs_from_configuration() {
        let (state, _) = test_state();
        // Expectation disagrees with the registered desired count of 2.
        let req = CheckRequest {
            expected_desired_count: 3,
            cluster_ref: None,
            service_ref: None,
        };
        let resp = run_check(State(state), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "FAILED");
        assert_eq!(body["message"], "desired count diverged from expectation");
    }

    #[tokio::test]
    async fn check_on_unreachable_platform_is_bad_gateway() {
        let (state, platform) = test_state();
        platform.fail_next_describes(1);

        let req = CheckRequest {
            expected_desired_count: 2,
            cluster_ref: Some(CLUSTER.to_string()),
            service_ref: Some(SERVICE.to_string()),
        };
        let resp = run_check(State(state), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn check_without_configuration_is_bad_gateway() {
        let (mut state, _) = test_state();
        state.config = Arc::new(MemoryConfigStore::new());

        let req = CheckRequest {
            expected_desired_count: 2,
            cluster_ref: None,
            service_ref: None,
        };
        let resp = run_check(State(state), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn check_request_parses_camel_case() {
        let req: CheckRequest = serde_json::from_str(
            r#"{"expectedDesiredCount":3,"clusterRef":"cluster-a","serviceRef":"svc-a"}"#,
        )
        .unwrap();
        assert_eq!(req.expected_desired_count, 3);
        assert_eq!(req.cluster_ref.as_deref(), Some("cluster-a"));
        assert_eq!(req.service_ref.as_deref(), Some("svc-a"));
    }
}
