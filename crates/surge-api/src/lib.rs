//! surge-api — REST API for Surge.
//!
//! Provides axum route handlers for submitting scaling requests, reading
//! the request ledger, and invoking a settlement check on demand.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/scaling-requests` | Submit a scaling request |
//! | GET | `/api/v1/scaling-requests` | List all scaling requests |
//! | GET | `/api/v1/scaling-requests/{id}` | Get one scaling request |
//! | POST | `/api/v1/check` | Run a settlement check |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use surge_check::CheckOracle;
use surge_intake::IntakeService;
use surge_ledger::Ledger;
use surge_platform::ConfigStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub intake: Arc<IntakeService>,
    pub ledger: Ledger,
    pub oracle: CheckOracle,
    pub config: Arc<dyn ConfigStore>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/scaling-requests",
            get(handlers::list_requests).post(handlers::submit_request),
        )
        .route("/scaling-requests/{id}", get(handlers::get_request))
        .route("/check", post(handlers::run_check))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
