#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use provisioner_clients::http::ServiceEndpoint;
use provisioner_clients::testing::{InMemoryIq, InMemoryNexus};
use provisioner_clients::{IqClient, NexusClient};
use provisioner_core::job::{Job, JobStatus, JobStore};
use provisioner_core::settings::{ApiEndpoint, PackageManager, ProvisioningSettings};
use provisioner_pipeline::BatchManager;
use tower::ServiceExt;

use provisioner_api::config::ServerConfig;
use provisioner_api::router::build_app_router;
use provisioner_api::state::AppState;

pub const TOKEN: &str = "test-token";
pub const ORG_ID: &str = "org-id-1";
pub const BASE_ROLE: &str = "nx-base";

fn endpoint(url: &str) -> ServiceEndpoint {
    ServiceEndpoint {
        base_url: url.to_string(),
        username: "admin".to_string(),
        password: "admin123".to_string(),
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        api_token: TOKEN.to_string(),
        nexus: endpoint("http://nexus.invalid"),
        iq: endpoint("http://iq.invalid"),
        base_roles: vec![BASE_ROLE.to_string()],
        extra_roles: Vec::new(),
        request_timeout_secs: 30,
        upstream_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        organizations_file: PathBuf::from("config/organizations.json"),
        package_managers_file: PathBuf::from("config/packageManager.json"),
    }
}

pub fn test_settings() -> ProvisioningSettings {
    let mut settings = ProvisioningSettings {
        base_roles: vec![BASE_ROLE.to_string()],
        ..Default::default()
    };
    settings
        .organizations
        .insert("org1".to_string(), ORG_ID.to_string());
    settings.package_managers.insert(
        "npm".to_string(),
        PackageManager {
            default_url: "https://registry.npmjs.org".to_string(),
            default_config: Default::default(),
            privilege_format: None,
            api_endpoint: ApiEndpoint {
                path: "/v1/repositories/npm/proxy".to_string(),
                format_specific_config: Default::default(),
            },
        },
    );
    settings
}

/// Test application backed by in-memory upstreams.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub nexus: Arc<InMemoryNexus>,
    pub iq: Arc<InMemoryIq>,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(nexus: InMemoryNexus, iq: InMemoryIq) -> TestApp {
    let nexus = Arc::new(nexus);
    let iq = Arc::new(iq);
    let batches = BatchManager::new(
        Arc::new(test_settings()),
        Arc::new(JobStore::new()),
        Arc::clone(&nexus) as Arc<dyn NexusClient>,
        Arc::clone(&iq) as Arc<dyn IqClient>,
    );
    let state = AppState {
        config: Arc::new(test_config()),
        batches,
    };

    TestApp {
        router: build_app_router(state.clone()),
        state,
        nexus,
        iq,
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a JSON body with a valid bearer token.
pub async fn json_auth(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the job store until the job reaches a terminal status.
pub async fn wait_for_job(state: &AppState, job_id: &str) -> Job {
    let id = job_id.parse().unwrap();
    let poll = async {
        loop {
            if let Some(job) = state.jobs().get_job(&id).await {
                if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("job finished in time")
}
