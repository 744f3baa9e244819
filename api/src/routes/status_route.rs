//! GET /api/v1/status: artifact versions and index statistics.

use std::sync::Arc;

use answer_engine::ServiceStatus;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub service: ServiceStatus,
}

pub async fn status(State(state): State<Arc<AppState>>) -> ApiResponse<StatusResponse> {
    let service = state.current().await;
    ApiResponse::success(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        service: service.status(),
    })
}
