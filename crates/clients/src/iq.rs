//! Policy-server REST client.
//!
//! Only organization role memberships are managed here: granting and
//! revoking the organization "Owner" role for a user.

use async_trait::async_trait;
use reqwest::Method;

use provisioner_core::operation::OperationConfig;
use provisioner_core::roles::OWNER_ROLE_NAME;

use crate::error::ClientError;
use crate::http::HttpClient;
use crate::models::{IqRole, IqRolesResponse};

/// Organization-role operations against the policy server.
#[async_trait]
pub trait IqClient: Send + Sync {
    /// All roles; empty when the endpoint answers 404.
    async fn get_roles(&self) -> Result<Vec<IqRole>, ClientError>;

    /// Id of the "Owner" role, `None` when no such role exists.
    async fn find_owner_role_id(&self) -> Result<Option<String>, ClientError>;

    async fn add_owner_role_to_user(&self, op: &OperationConfig) -> Result<(), ClientError>;

    /// Removing a membership that does not exist succeeds.
    async fn remove_owner_role_from_user(&self, op: &OperationConfig) -> Result<(), ClientError>;
}

/// [`IqClient`] over HTTP.
pub struct IqServerApi {
    http: HttpClient,
}

impl IqServerApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn membership_path(&self, op: &OperationConfig) -> Result<String, ClientError> {
        let role_id = self
            .find_owner_role_id()
            .await?
            .ok_or(ClientError::OwnerRoleNotFound)?;
        Ok(owner_membership_path(
            &op.organization_id,
            &role_id,
            &op.ldap_username,
        ))
    }
}

#[async_trait]
impl IqClient for IqServerApi {
    async fn get_roles(&self) -> Result<Vec<IqRole>, ClientError> {
        match self
            .http
            .execute_json::<IqRolesResponse>(self.http.request(Method::GET, "/api/v2/roles"))
            .await
        {
            Ok(response) => Ok(response.roles),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn find_owner_role_id(&self) -> Result<Option<String>, ClientError> {
        let roles = self.get_roles().await?;
        owner_role_id(&roles)
    }

    async fn add_owner_role_to_user(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let path = self.membership_path(op).await?;

        self.http
            .execute_unit(self.http.request(Method::PUT, &path))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    ldap_username = %op.ldap_username,
                    organization_id = %op.organization_id,
                    error = %e,
                    "Failed adding owner role to user"
                );
            })?;

        tracing::debug!(
            ldap_username = %op.ldap_username,
            organization_id = %op.organization_id,
            "Owner role granted"
        );
        Ok(())
    }

    async fn remove_owner_role_from_user(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let path = self.membership_path(op).await?;

        match self
            .http
            .execute_unit(self.http.request(Method::DELETE, &path))
            .await
        {
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    ldap_username = %op.ldap_username,
                    organization_id = %op.organization_id,
                    "Owner role membership already absent"
                );
                Ok(())
            }
            other => other,
        }
    }
}

/// Pick the "Owner" role out of a role list.
///
/// A role with the right name but an empty id is an upstream data error.
pub fn owner_role_id(roles: &[IqRole]) -> Result<Option<String>, ClientError> {
    match roles.iter().find(|r| r.name == OWNER_ROLE_NAME) {
        Some(role) if role.id.is_empty() => {
            tracing::warn!("'{OWNER_ROLE_NAME}' role found but id is empty");
            Err(ClientError::OwnerRoleMissingId)
        }
        Some(role) => Ok(Some(role.id.clone())),
        None => {
            tracing::warn!("'{OWNER_ROLE_NAME}' role not found in policy server");
            Ok(None)
        }
    }
}

fn owner_membership_path(organization_id: &str, role_id: &str, user: &str) -> String {
    format!("/api/v2/roleMemberships/organization/{organization_id}/role/{role_id}/user/{user}")
}
