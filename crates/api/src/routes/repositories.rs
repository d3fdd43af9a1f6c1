use axum::routing::post;
use axum::Router;

use crate::handlers::repositories;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/repositories",
        post(repositories::create_repositories).delete(repositories::delete_repositories),
    )
}
