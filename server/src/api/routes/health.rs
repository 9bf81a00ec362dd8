//! Health check endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::data::TransactionalService;

/// Upper bound on the database ping
const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct HealthApiState {
    pub database: Arc<TransactionalService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub database: String,
    pub version: &'static str,
}

pub fn routes(database: Arc<TransactionalService>) -> Router<()> {
    Router::new()
        .route("/", get(health))
        .with_state(HealthApiState { database })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<HealthApiState>) -> (StatusCode, Json<HealthResponse>) {
    let repo = state.database.repository();
    let ping = match tokio::time::timeout(PING_TIMEOUT, repo.ping()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err("ping timed out".to_string()),
    };

    match ping {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                message: "Service is running",
                database: "healthy".to_string(),
                version: env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, backend = %state.database.backend(), "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    message: "Service is degraded",
                    database: format!("unhealthy: {}", e),
                    version: env!("CARGO_PKG_VERSION"),
                }),
            )
        }
    }
}
