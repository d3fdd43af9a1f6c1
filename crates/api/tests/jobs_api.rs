//! HTTP-level tests for `/jobs/{id}`.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get_auth};
use provisioner_clients::testing::{InMemoryIq, InMemoryNexus};
use provisioner_core::request::Action;
use uuid::Uuid;

#[tokio::test]
async fn existing_job_is_returned_in_camel_case() {
    let app = build_test_app(InMemoryNexus::new(), InMemoryIq::new());
    let id = Uuid::new_v4();
    app.state.jobs().create_job(id, Action::Delete, 4).await;

    let response = get_auth(app.router, &format!("/jobs/{id}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["status"], "pending");
    assert_eq!(json["action"], "delete");
    assert_eq!(json["totalRequests"], 4);
    assert_eq!(json["notProcessedOperations"], 4);
    assert_eq!(json["message"], "Job queued");
    assert!(json["createdAt"].is_string());
    assert!(json["failedRequests"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = build_test_app(InMemoryNexus::new(), InMemoryIq::new());
    let id = Uuid::new_v4();

    let response = get_auth(app.router, &format!("/jobs/{id}")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], format!("Job {id} not found"));
}

#[tokio::test]
async fn malformed_job_id_returns_404() {
    let app = build_test_app(InMemoryNexus::new(), InMemoryIq::new());

    let response = get_auth(app.router, "/jobs/not-a-uuid").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Job not-a-uuid not found");
}
