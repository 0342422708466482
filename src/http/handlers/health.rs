use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::http::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub message: &'static str,
    pub service_name: String,
    pub instance_id: String,
}

/// `GET /health-check`
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthCheckResponse>) {
    let report = state.health.check().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(HealthCheckResponse {
            message: report.status,
            service_name: report.service_name,
            instance_id: report.instance_id,
        }),
    )
}
