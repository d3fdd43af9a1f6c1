//! Operation config resolution.
//!
//! Turns a [`RepositoryRequest`] plus the static [`ProvisioningSettings`] into
//! a fully resolved [`OperationConfig`]. Pure and deterministic, no I/O.

use serde::Serialize;

use crate::error::CoreError;
use crate::request::{Action, RepositoryRequest};
use crate::roles::{RELEASE_INFIX, SHARED_ROLE, SHARED_SUFFIX};
use crate::settings::{PackageManager, ProvisioningSettings};

/// Resolved descriptor for one create/delete operation.
///
/// Lives for the duration of a single operation and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationConfig {
    pub action: Action,
    pub ldap_username: String,
    pub organization_id: String,
    pub remote_url: String,
    pub extra_roles: Vec<String>,
    pub base_roles: Vec<String>,
    pub repository_name: String,
    pub privilege_name: String,
    pub role_name: String,
    pub package_manager: String,
    pub shared: bool,
    pub app_id: String,
}

impl OperationConfig {
    /// Offboarding is a delete of a shared request that still names an app.
    pub fn is_offboarding(&self) -> bool {
        self.shared && !self.app_id.is_empty()
    }
}

/// `{lowercase(package_manager)}-release-{app_id | "shared"}`.
pub fn repository_name(package_manager: &str, shared: bool, app_id: &str) -> String {
    let suffix = if shared { SHARED_SUFFIX } else { app_id };
    format!("{}{RELEASE_INFIX}{suffix}", package_manager.to_lowercase())
}

/// The per-user role, or the fixed shared role for shared requests.
pub fn role_name(ldap_username: &str, shared: bool) -> String {
    if shared {
        SHARED_ROLE.to_string()
    } else {
        ldap_username.to_string()
    }
}

/// Suffix every resource belonging to `app_id` ends with.
pub fn app_suffix(app_id: &str) -> String {
    format!("{RELEASE_INFIX}{app_id}")
}

impl ProvisioningSettings {
    /// Look up a package manager by exact name, then by its lowercase form.
    pub fn package_manager(&self, name: &str) -> Option<&PackageManager> {
        self.package_managers
            .get(name)
            .or_else(|| self.package_managers.get(&name.to_lowercase()))
    }

    /// Resolve a request into an [`OperationConfig`].
    ///
    /// Fails with [`CoreError::NotFound`] when the organization is unknown or
    /// a non-empty package manager is not configured. An empty package manager
    /// (offboarding deletes) resolves with an empty remote URL.
    pub fn resolve(
        &self,
        request: &RepositoryRequest,
        action: Action,
    ) -> Result<OperationConfig, CoreError> {
        let organization_id = self
            .organizations
            .get(&request.organization_name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "organization",
                name: request.organization_name.clone(),
            })?;

        let remote_url = if request.package_manager.is_empty() {
            String::new()
        } else {
            self.package_manager(&request.package_manager)
                .map(|pm| pm.default_url.clone())
                .ok_or_else(|| CoreError::NotFound {
                    entity: "package manager",
                    name: request.package_manager.clone(),
                })?
        };

        let repository_name =
            repository_name(&request.package_manager, request.shared, &request.app_id);

        Ok(OperationConfig {
            action,
            ldap_username: request.ldap_username.clone(),
            organization_id,
            remote_url,
            extra_roles: self.extra_roles.clone(),
            base_roles: self.base_roles.clone(),
            privilege_name: repository_name.clone(),
            repository_name,
            role_name: role_name(&request.ldap_username, request.shared),
            package_manager: request.package_manager.clone(),
            shared: request.shared,
            app_id: request.app_id.clone(),
        })
    }
}
