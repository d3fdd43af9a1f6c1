//! Repository-manager REST client.
//!
//! [`NexusClient`] is the capability set the provisioning workflows consume;
//! [`NexusApi`] implements it over the `/v1` REST API. Lookups return
//! `Ok(None)` on 404 and deletes treat 404 as success, so callers only see
//! errors for genuine upstream failures.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};

use provisioner_core::operation::OperationConfig;
use provisioner_core::settings::{PackageManager, ProvisioningSettings};

use crate::error::ClientError;
use crate::http::HttpClient;
use crate::models::{Privilege, Repository, Role, User};

/// Actions granted by every repository privilege.
pub const PRIVILEGE_ACTIONS: [&str; 5] = ["BROWSE", "READ", "EDIT", "ADD", "DELETE"];

/// Sent on every user update; LDAP-sourced users lack these and the API
/// rejects blanks.
pub const PLACEHOLDER_EMAIL: &str = "useless@example.com";
pub const PLACEHOLDER_LAST_NAME: &str = "useless";

const CACHE_MAX_AGE_MINUTES: u64 = 1440;

/// Operations the provisioning workflows perform against the repository manager.
#[async_trait]
pub trait NexusClient: Send + Sync {
    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, ClientError>;
    async fn get_repositories(&self) -> Result<Vec<Repository>, ClientError>;
    async fn create_proxy_repository(&self, op: &OperationConfig) -> Result<(), ClientError>;
    /// Deleting an absent repository succeeds.
    async fn delete_repository(&self, name: &str) -> Result<(), ClientError>;

    async fn get_privilege(&self, name: &str) -> Result<Option<Privilege>, ClientError>;
    async fn get_privileges(&self) -> Result<Vec<Privilege>, ClientError>;
    async fn create_privilege(&self, op: &OperationConfig) -> Result<(), ClientError>;
    async fn delete_privilege(&self, name: &str) -> Result<(), ClientError>;

    async fn get_role(&self, id: &str) -> Result<Option<Role>, ClientError>;
    /// A duplicate (400) counts as created.
    async fn create_role(&self, op: &OperationConfig) -> Result<(), ClientError>;
    async fn update_role(&self, role: &Role) -> Result<(), ClientError>;
    async fn delete_role(&self, id: &str) -> Result<(), ClientError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, ClientError>;
    async fn update_user(&self, user: &User) -> Result<(), ClientError>;
}

/// [`NexusClient`] over HTTP.
pub struct NexusApi {
    http: HttpClient,
    settings: Arc<ProvisioningSettings>,
}

impl NexusApi {
    /// `settings` supplies the package manager catalogue used to build proxy
    /// repository payloads and privilege formats.
    pub fn new(http: HttpClient, settings: Arc<ProvisioningSettings>) -> Self {
        Self { http, settings }
    }

    fn package_manager(&self, op: &OperationConfig) -> Result<&PackageManager, ClientError> {
        self.settings
            .package_manager(&op.package_manager)
            .ok_or_else(|| ClientError::UnsupportedFormat(op.package_manager.clone()))
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        match self.http.execute_json(self.http.request(Method::GET, path)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_ignoring_missing(&self, path: &str) -> Result<(), ClientError> {
        match self
            .http
            .execute_unit(self.http.request(Method::DELETE, path))
            .await
        {
            Err(e) if e.is_not_found() => {
                tracing::debug!(path, "Already deleted");
                Ok(())
            }
            other => other,
        }
    }
}

#[async_trait]
impl NexusClient for NexusApi {
    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, ClientError> {
        self.get_optional(&format!("/v1/repositories/{name}")).await
    }

    async fn get_repositories(&self) -> Result<Vec<Repository>, ClientError> {
        self.http
            .execute_json(self.http.request(Method::GET, "/v1/repositories"))
            .await
    }

    async fn create_proxy_repository(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let manager = self.package_manager(op)?;
        let payload = proxy_repository_payload(op, manager);

        tracing::debug!(
            repository_name = %op.repository_name,
            endpoint = %manager.api_endpoint.path,
            "Creating proxy repository"
        );
        self.http
            .execute_unit(
                self.http
                    .request(Method::POST, &manager.api_endpoint.path)
                    .json(&payload),
            )
            .await
    }

    async fn delete_repository(&self, name: &str) -> Result<(), ClientError> {
        self.delete_ignoring_missing(&format!("/v1/repositories/{name}"))
            .await
    }

    async fn get_privilege(&self, name: &str) -> Result<Option<Privilege>, ClientError> {
        self.get_optional(&format!("/v1/security/privileges/{name}"))
            .await
    }

    async fn get_privileges(&self) -> Result<Vec<Privilege>, ClientError> {
        self.http
            .execute_json(self.http.request(Method::GET, "/v1/security/privileges"))
            .await
    }

    async fn create_privilege(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let format = privilege_format(
            &op.package_manager,
            self.settings.package_manager(&op.package_manager),
        );
        let payload = privilege_payload(op, &format);

        self.http
            .execute_unit(
                self.http
                    .request(Method::POST, "/v1/security/privileges/repository-view")
                    .json(&payload),
            )
            .await
    }

    async fn delete_privilege(&self, name: &str) -> Result<(), ClientError> {
        self.delete_ignoring_missing(&format!("/v1/security/privileges/{name}"))
            .await
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>, ClientError> {
        self.get_optional(&format!("/v1/security/roles/{id}")).await
    }

    async fn create_role(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let role = role_payload(op);
        match self
            .http
            .execute_unit(
                self.http
                    .request(Method::POST, "/v1/security/roles")
                    .json(&role),
            )
            .await
        {
            Err(ClientError::Api { status: 400, .. }) => {
                tracing::debug!(role_name = %role.id, "Role already exists");
                Ok(())
            }
            other => other,
        }
    }

    async fn update_role(&self, role: &Role) -> Result<(), ClientError> {
        if role.id.is_empty() {
            return Err(ClientError::MissingIdentifier("role id"));
        }
        self.http
            .execute_unit(
                self.http
                    .request(Method::PUT, &format!("/v1/security/roles/{}", role.id))
                    .json(role),
            )
            .await
    }

    async fn delete_role(&self, id: &str) -> Result<(), ClientError> {
        self.delete_ignoring_missing(&format!("/v1/security/roles/{id}"))
            .await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, ClientError> {
        let users: Vec<User> = self
            .http
            .execute_json(
                self.http
                    .request(Method::GET, "/v1/security/users")
                    .query(&[("userId", user_id)]),
            )
            .await?;

        // The endpoint matches by prefix; only an exact id counts.
        Ok(users.into_iter().find(|u| u.user_id == user_id))
    }

    async fn update_user(&self, user: &User) -> Result<(), ClientError> {
        if user.user_id.is_empty() {
            return Err(ClientError::MissingIdentifier("userId"));
        }
        let user = normalized_user(user);
        self.http
            .execute_unit(
                self.http
                    .request(Method::PUT, &format!("/v1/security/users/{}", user.user_id))
                    .json(&user),
            )
            .await
    }
}

// ---- Payload builders ----

/// Proxy repository body: computed base fields, overridden by the package
/// manager's `default_config`, overridden in turn by its
/// `format_specific_config`.
pub fn proxy_repository_payload(op: &OperationConfig, manager: &PackageManager) -> Value {
    let mut payload = Map::new();
    payload.insert("name".into(), json!(op.repository_name));
    payload.insert("online".into(), json!(true));
    payload.insert(
        "storage".into(),
        json!({
            "blobStoreName": "default",
            "strictContentTypeValidation": true,
        }),
    );
    payload.insert(
        "proxy".into(),
        json!({
            "remoteUrl": op.remote_url,
            "contentMaxAge": CACHE_MAX_AGE_MINUTES,
            "metadataMaxAge": CACHE_MAX_AGE_MINUTES,
        }),
    );
    payload.insert(
        "negativeCache".into(),
        json!({ "enabled": true, "timeToLive": CACHE_MAX_AGE_MINUTES }),
    );
    payload.insert(
        "httpClient".into(),
        json!({ "blocked": false, "autoBlock": true }),
    );

    for (key, value) in &manager.default_config {
        payload.insert(key.clone(), value.clone());
    }
    for (key, value) in &manager.api_endpoint.format_specific_config {
        payload.insert(key.clone(), value.clone());
    }

    Value::Object(payload)
}

/// Format name the repository manager expects on a privilege.
///
/// An explicit `privilege_format` wins; otherwise the lowercase package
/// manager name, with `maven` mapped to `maven2`.
pub fn privilege_format(package_manager: &str, manager: Option<&PackageManager>) -> String {
    if let Some(format) = manager
        .and_then(|m| m.privilege_format.as_deref())
        .filter(|f| !f.is_empty())
    {
        return format.to_string();
    }
    match package_manager.to_lowercase().as_str() {
        "maven" => "maven2".to_string(),
        other => other.to_string(),
    }
}

pub fn privilege_payload(op: &OperationConfig, format: &str) -> Privilege {
    Privilege {
        name: op.privilege_name.clone(),
        description: format!("All permissions for repository '{}'", op.repository_name),
        actions: PRIVILEGE_ACTIONS.iter().map(|a| a.to_string()).collect(),
        format: format.to_string(),
        repository: op.repository_name.clone(),
        privilege_type: String::new(),
    }
}

/// A new role holding exactly the operation's privilege.
pub fn role_payload(op: &OperationConfig) -> Role {
    Role {
        id: op.role_name.clone(),
        name: op.role_name.clone(),
        description: format!("Role for {}", op.ldap_username),
        privileges: vec![op.privilege_name.clone()],
        roles: Vec::new(),
    }
}

fn normalized_user(user: &User) -> User {
    User {
        email_address: PLACEHOLDER_EMAIL.to_string(),
        last_name: PLACEHOLDER_LAST_NAME.to_string(),
        ..user.clone()
    }
}
