//! Handlers for `/repositories`.
//!
//! Both endpoints validate the batch synchronously, queue a job for the
//! valid requests and answer `202 Accepted`. Downstream failures only show
//! up on the job.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use provisioner_core::request::{Action, BatchRequest};
use provisioner_core::validation::validate_batch;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::BearerAuth;
use crate::response::{BatchAccepted, ValidationSummary, MESSAGE_JOB_ACCEPTED};
use crate::state::AppState;

/// POST /repositories
pub async fn create_repositories(
    _auth: BearerAuth,
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    submit_batch(&state, payload, Action::Create).await
}

/// DELETE /repositories
pub async fn delete_repositories(
    _auth: BearerAuth,
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    submit_batch(&state, payload, Action::Delete).await
}

async fn submit_batch(
    state: &AppState,
    payload: Result<Json<BatchRequest>, JsonRejection>,
    action: Action,
) -> AppResult<(StatusCode, Json<BatchAccepted>)> {
    let Json(batch) = payload.map_err(|e| AppError::InvalidBody(e.body_text()))?;

    if batch.requests.is_empty() {
        return Err(AppError::EmptyBatch);
    }
    batch
        .validate()
        .map_err(|e| AppError::InvalidBody(e.to_string()))?;

    let validation = validate_batch(&batch.requests, action);
    if validation.valid.is_empty() {
        tracing::warn!(
            action = %action,
            invalid_requests = validation.invalid.len(),
            "Rejected batch: every request failed validation"
        );
        return Err(AppError::ValidationFailed(validation.invalid));
    }

    let ticket = state.batches.process_batch_async(&validation, action).await;

    tracing::info!(
        job_id = %ticket.job_id,
        action = %action,
        total_requests = ticket.total_requests,
        valid_requests = ticket.valid_requests,
        invalid_requests = ticket.invalid_requests,
        "Batch accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            success: true,
            message: MESSAGE_JOB_ACCEPTED,
            job_id: ticket.job_id,
            status: ticket.status,
            validation: ValidationSummary::from(validation),
        }),
    ))
}
