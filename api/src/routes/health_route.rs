//! GET /api/v1/health: liveness plus a summary of loaded artifacts.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub services: HealthServices,
}

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub guardrail: &'static str,
    pub passage_index: &'static str,
    pub indexed_chunks: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let service = state.current().await;
    let chunks = service.index().len();
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        services: HealthServices {
            guardrail: "loaded",
            passage_index: if chunks == 0 { "empty" } else { "loaded" },
            indexed_chunks: chunks,
        },
    })
}
