//! POST /api/v1/admin/reload: load fresh artifacts and swap them in.
//!
//! In-flight requests finish on the artifacts they started with.

use std::sync::Arc;

use answer_engine::ServiceStatus;
use axum::extract::State;
use tracing::info;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
};

pub async fn reload(State(state): State<Arc<AppState>>) -> AppResult<ApiResponse<ServiceStatus>> {
    info!(target: "api::reload", "reload requested");
    let fresh = state.reload().await?;
    Ok(ApiResponse::success(fresh.status()))
}
