//! HTTP surface over the answer engine.
//!
//! Routes:
//! - `POST /api/v1/ask`
//! - `GET  /api/v1/health`
//! - `GET  /api/v1/status`
//! - `POST /api/v1/admin/reload`

mod core;
mod error_handler;
mod middleware_layer;
mod routes;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::signal;
use tracing::{error, info};

pub use crate::core::app_state::AppState;
pub use crate::error_handler::AppError;

use crate::{
    middleware_layer::json_extractor::json_error_mapper,
    routes::{
        ask::ask_question_route::ask_question, health_route::health, reload_route::reload,
        status_route::status,
    },
};

/// Build the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/ask", post(ask_question))
        .route("/api/v1/health", get(health))
        .route("/api/v1/status", get(status))
        .route("/api/v1/admin/reload", post(reload))
        .layer(middleware::from_fn(json_error_mapper))
        .with_state(state)
}

/// Bind `address` and serve until Ctrl+C.
pub async fn start(address: &str, state: AppState) -> Result<(), AppError> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(AppError::Bind)?;
    info!(target: "api::server", %address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!(target: "api::server", "server stopped");
    Ok(())
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(target: "api::server", error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
