//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::db::pool::health_check as db_health_check;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
}

/// Detailed health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealthResponse {
    /// "ok" or "unhealthy"
    pub status: String,

    pub server: String,

    pub database: String,

    pub nats: String,

    pub workflow_stages: usize,

    pub uptime_seconds: u64,

    pub version: String,
}

/// Liveness check.
///
/// `GET /health`
pub async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check including database connectivity.
///
/// `GET /api/health`
///
/// Returns `503 Service Unavailable` when the database does not answer.
pub async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<ApiHealthResponse>) {
    let db_healthy = db_health_check(&state.db).await;

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = ApiHealthResponse {
        status: if db_healthy { "ok" } else { "unhealthy" }.to_string(),
        server: state.config.server_name.clone(),
        database: if db_healthy { "connected" } else { "disconnected" }.to_string(),
        nats: if state.has_nats() {
            "connected"
        } else {
            "not_configured"
        }
        .to_string(),
        workflow_stages: state.workflow.stages.len(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
