use answer_engine::{EngineError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- IO / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("{0}")]
    Validation(#[from] ValidationError),

    // --- Admin ---
    #[error("failed to reload artifacts")]
    Reload(#[source] EngineError),

    #[error("background task failed: {0}")]
    Join(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Bind(_) | AppError::Server(_) | AppError::Reload(_) | AppError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::Validation(_) => "INVALID_INPUT",
            AppError::Reload(_) => "RELOAD_FAILED",
            AppError::Join(_) => "INTERNAL_ERROR",
        }
    }

    /// Field the client should fix, if any.
    fn detail(&self) -> Option<ApiErrorDetail> {
        let AppError::Validation(v) = self else {
            return None;
        };
        let path = match v {
            ValidationError::UnsupportedGrade { .. } => "grade",
            ValidationError::UnsupportedSubject { .. } => "subject",
            _ => "question",
        };
        Some(ApiErrorDetail {
            path: Some(path.into()),
            hint: None,
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal causes stay in the log.
        let message = match &self {
            AppError::Reload(e) => {
                error!(target: "api::error", error = %e, "reload failed");
                self.to_string()
            }
            AppError::Join(_) => {
                error!(target: "api::error", error = %self, "task failed");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        ApiResponse::<()>::error(self.error_code(), message, self.detail().into_iter().collect())
            .into_response_with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;
