use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use provisioner_core::validation::InvalidRequest;
use serde_json::json;

use crate::response::FailedValidation;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] so every failure renders JSON.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or wrong bearer token.
    #[error("Invalid token")]
    Unauthorized,

    #[error("Job {0} not found")]
    JobNotFound(String),

    /// The body could not be parsed or failed whole-body validation.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Batch must contain at least one request")]
    EmptyBatch,

    /// Every request in the batch failed per-request validation.
    #[error("All requests failed validation")]
    ValidationFailed(Vec<InvalidRequest>),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Invalid token" })),
            AppError::JobNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Job {id} not found") }),
            ),
            AppError::InvalidBody(details) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "success": false,
                    "error": "invalid_request_body",
                    "message": "Invalid request body",
                    "details": details,
                }),
            ),
            AppError::EmptyBatch => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "success": false,
                    "error": "validation_failed",
                    "message": "Batch must contain at least one request",
                }),
            ),
            AppError::ValidationFailed(invalid) => {
                let details: Vec<FailedValidation> =
                    invalid.into_iter().map(FailedValidation::from).collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({
                        "success": false,
                        "message": "All requests failed validation",
                        "error": "validation_failed",
                        "invalidRequests": {
                            "count": details.len(),
                            "details": details,
                        },
                    }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
