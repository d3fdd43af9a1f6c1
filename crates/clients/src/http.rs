//! Shared authenticated HTTP plumbing for both resource clients.
//!
//! Every request carries basic auth and JSON headers, runs under the
//! configured timeout, and is logged by outcome. Non-2xx responses become
//! [`ClientError::Api`] so callers can match on the status code.

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// Response bodies longer than this are truncated in logs and errors.
const MAX_LOGGED_BODY: usize = 1000;

/// Credentials and location of one upstream service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Authenticated JSON client bound to one base URL.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl HttpClient {
    /// Build a client whose every call is bounded by `timeout`.
    pub fn new(mut endpoint: ServiceEndpoint, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        endpoint.base_url = endpoint.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, endpoint })
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    /// Start a request to `path` with auth and JSON headers applied.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.endpoint.base_url, path))
            .basic_auth(&self.endpoint.username, Some(&self.endpoint.password))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
    }

    /// Send a prepared request, turning non-2xx responses into errors.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().to_string();

        tracing::debug!(%method, %url, "HTTP request start");
        let start = Instant::now();

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%method, %url, error = %e, "HTTP request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        let duration_ms = start.elapsed().as_millis() as u64;

        if status.is_success() {
            tracing::debug!(%method, %url, status = status.as_u16(), duration_ms, "HTTP request completed");
            return Ok(response);
        }

        let body = truncate_body(
            response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string()),
        );

        // 404 is the routine answer to an existence check.
        if status.as_u16() == 404 {
            tracing::debug!(%method, %url, status = 404, %body, duration_ms, "Resource not found");
        } else if status.is_server_error() {
            tracing::error!(%method, %url, status = status.as_u16(), %body, duration_ms, "API error response (server)");
        } else {
            tracing::warn!(%method, %url, status = status.as_u16(), %body, duration_ms, "API error response (client)");
        }

        Err(ClientError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Send and decode a JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.execute(builder).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send, discarding the body.
    pub async fn execute_unit(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.execute(builder).await?;
        Ok(())
    }
}

fn truncate_body(body: String) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_LOGGED_BODY {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_LOGGED_BODY).collect();
    truncated.push('…');
    truncated
}
