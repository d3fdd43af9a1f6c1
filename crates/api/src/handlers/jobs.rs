//! Handlers for `/jobs`.

use axum::extract::{Path, State};
use axum::Json;
use provisioner_core::job::Job;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::BearerAuth;
use crate::state::AppState;

/// GET /jobs/{id}
///
/// Returns the job record as-is. Ids that are not UUIDs are simply unknown.
pub async fn get_job(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Job>> {
    let job_id = Uuid::parse_str(&id).map_err(|_| AppError::JobNotFound(id.clone()))?;

    let job = state
        .jobs()
        .get_job(&job_id)
        .await
        .ok_or(AppError::JobNotFound(id))?;

    Ok(Json(job))
}
