pub mod health;
pub mod jobs;
pub mod repositories;

use axum::Router;

use crate::state::AppState;

/// Build the authenticated route tree.
///
/// ```text
/// /repositories          create batch (POST), delete batch (DELETE)
/// /jobs/{id}             job status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(repositories::router())
        .merge(jobs::router())
}
