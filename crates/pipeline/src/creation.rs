//! Creation workflow: repository, privilege, role, then user.
//!
//! Every step checks current state first and is a no-op when its target
//! already exists, so re-running a request is safe. A failing step stops
//! the remaining steps of that request only.

use provisioner_clients::NexusClient;
use provisioner_core::operation::OperationConfig;

use crate::error::OperationError;
use crate::locks::ResourceLocks;
use crate::summary::{OperationMode, OperationSummary};

pub struct CreationWorkflow<'a> {
    op: &'a OperationConfig,
    nexus: &'a dyn NexusClient,
    locks: &'a ResourceLocks,
}

impl<'a> CreationWorkflow<'a> {
    pub fn new(
        op: &'a OperationConfig,
        nexus: &'a dyn NexusClient,
        locks: &'a ResourceLocks,
    ) -> Self {
        Self {
            op,
            nexus,
            locks,
        }
    }

    /// Run all four steps in order.
    pub async fn run(&self) -> Result<OperationSummary, OperationError> {
        tracing::debug!(
            repository_name = %self.op.repository_name,
            ldap_username = %self.op.ldap_username,
            "Creation workflow started"
        );

        self.ensure_repository().await?;
        self.ensure_privilege().await?;
        self.ensure_role_has_privilege().await?;
        self.ensure_user_has_roles().await?;

        let mode = if self.op.shared {
            OperationMode::SharedRole
        } else {
            OperationMode::Standard
        };
        Ok(OperationSummary::new(self.op, mode))
    }

    /// Create the proxy repository unless one with the same name exists.
    pub async fn ensure_repository(&self) -> Result<(), OperationError> {
        let name = &self.op.repository_name;

        let existing = self
            .nexus
            .get_repository(name)
            .await
            .map_err(OperationError::upstream(format!("get repository '{name}'")))?;
        if existing.is_some() {
            tracing::debug!(repository_name = %name, "Repository already exists, skipping creation");
            return Ok(());
        }

        self.nexus
            .create_proxy_repository(self.op)
            .await
            .map_err(OperationError::upstream(format!(
                "create proxy repository '{name}' (package_manager='{}', remote_url='{}')",
                self.op.package_manager, self.op.remote_url
            )))?;

        tracing::info!(
            repository_name = %name,
            package_manager = %self.op.package_manager,
            remote_url = %self.op.remote_url,
            "Created proxy repository"
        );
        Ok(())
    }

    /// Create the repository-view privilege unless it exists.
    pub async fn ensure_privilege(&self) -> Result<(), OperationError> {
        let name = &self.op.privilege_name;

        let existing = self
            .nexus
            .get_privilege(name)
            .await
            .map_err(OperationError::upstream(format!("get privilege '{name}'")))?;
        if existing.is_some() {
            tracing::debug!(privilege_name = %name, "Privilege already exists, skipping creation");
            return Ok(());
        }

        self.nexus
            .create_privilege(self.op)
            .await
            .map_err(OperationError::upstream(format!(
                "create privilege '{name}' for repository '{}'",
                self.op.repository_name
            )))?;

        tracing::info!(
            privilege_name = %name,
            repository_name = %self.op.repository_name,
            "Created repository privilege"
        );
        Ok(())
    }

    /// Make sure the role exists and lists the privilege.
    ///
    /// Holds the role's lock for the whole read-modify-write.
    pub async fn ensure_role_has_privilege(&self) -> Result<(), OperationError> {
        let role_name = &self.op.role_name;
        let privilege = &self.op.privilege_name;
        let _guard = self.locks.role(role_name).await;

        let role = self
            .nexus
            .get_role(role_name)
            .await
            .map_err(OperationError::upstream(format!(
                "add privilege '{privilege}' to role '{role_name}': get role failed"
            )))?;

        match role {
            Some(role) if role.has_privilege(privilege) => {
                tracing::debug!(role_name = %role_name, privilege_name = %privilege, "Privilege already in role");
            }
            Some(mut role) => {
                role.privileges.push(privilege.clone());
                self.nexus
                    .update_role(&role)
                    .await
                    .map_err(OperationError::upstream(format!(
                        "add privilege '{privilege}' to role '{role_name}': update role failed"
                    )))?;
                tracing::info!(role_name = %role_name, privilege_name = %privilege, "Added privilege to existing role");
            }
            None => {
                self.nexus
                    .create_role(self.op)
                    .await
                    .map_err(OperationError::upstream(format!(
                        "add privilege '{privilege}' to role '{role_name}': create role failed"
                    )))?;
                tracing::info!(role_name = %role_name, privilege_name = %privilege, "Created role with privilege");
            }
        }
        Ok(())
    }

    /// Grant the target role, the extra roles and the base roles to the user.
    ///
    /// The user must already exist. Roles the user holds are kept in place;
    /// missing ones are appended in that order. Holds the user's lock for
    /// the whole read-modify-write.
    pub async fn ensure_user_has_roles(&self) -> Result<(), OperationError> {
        let username = &self.op.ldap_username;
        let _guard = self.locks.user(username).await;

        let mut user = self
            .nexus
            .get_user(username)
            .await
            .map_err(OperationError::upstream(format!(
                "add role to user '{username}': get user failed"
            )))?
            .ok_or_else(|| OperationError::UserNotFound(username.clone()))?;

        let wanted = std::iter::once(&self.op.role_name)
            .chain(&self.op.extra_roles)
            .chain(&self.op.base_roles);
        let added = merge_roles(&mut user.roles, wanted);
        if added == 0 {
            tracing::debug!(ldap_username = %username, "User already holds every role");
            return Ok(());
        }

        self.nexus
            .update_user(&user)
            .await
            .map_err(OperationError::upstream(format!(
                "add role to user '{username}': update user failed"
            )))?;

        tracing::info!(
            ldap_username = %username,
            role_name = %self.op.role_name,
            added_roles = added,
            "Updated user roles"
        );
        Ok(())
    }
}

/// Append every non-empty role not already in `roles`. Returns how many
/// were added.
fn merge_roles<'r>(roles: &mut Vec<String>, wanted: impl IntoIterator<Item = &'r String>) -> usize {
    let before = roles.len();
    for role in wanted {
        if !role.is_empty() && !roles.contains(role) {
            roles.push(role.clone());
        }
    }
    roles.len() - before
}
