//! POST /api/v1/ask: gate, retrieve, and answer one question.

use std::sync::Arc;

use answer_engine::{AskRequest, AskResponse};
use axum::{Json, extract::State};
use tracing::instrument;

use crate::{
    core::app_state::AppState, error_handler::AppResult, routes::ask::ask_request::AskBody,
};

/// Handler: POST /api/v1/ask
///
/// Invalid input is a 400 envelope. Every pipeline status, `error`
/// included, is a 200 with the ask response body.
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8000/api/v1/ask \
///   -H 'content-type: application/json' \
///   -d '{"grade":"Grade 10","subject":"Science","question":"What is photosynthesis?"}'
/// ```
#[instrument(name = "ask_route", skip_all)]
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskBody>,
) -> AppResult<Json<AskResponse>> {
    let service = state.current().await;
    let outcome = service.ask(&AskRequest::from(body))?;
    Ok(Json(outcome.to_response()))
}
