//! Organization-role cleanup after a successful deletion.
//!
//! The organization "Owner" role is revoked only when the user has nothing
//! left in the repository manager beyond base roles: no project roles, and
//! no shared role that still grants privileges.

use provisioner_clients::{IqClient, NexusClient};
use provisioner_core::operation::OperationConfig;
use provisioner_core::role_engine::RoleDecisionEngine;
use provisioner_core::roles::SHARED_ROLE;

use crate::error::OperationError;

/// Inputs to the owner-role revocation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRemovalCheck {
    pub has_other_roles: bool,
    pub shared_role_assigned: bool,
    pub shared_role_empty: bool,
    /// Remaining roles are non-empty and all configured base roles.
    pub only_base_roles: bool,
}

impl OwnerRemovalCheck {
    pub fn should_remove(&self) -> bool {
        !self.has_other_roles && self.shared_role_empty && self.only_base_roles
    }
}

/// Whether `roles` is non-empty and contained in `base_roles`.
fn only_base_roles(roles: &[String], base_roles: &[String]) -> bool {
    !base_roles.is_empty() && !roles.is_empty() && roles.iter().all(|r| base_roles.contains(r))
}

pub struct OrgRoleCleanup<'a> {
    op: &'a OperationConfig,
    nexus: &'a dyn NexusClient,
    iq: &'a dyn IqClient,
}

impl<'a> OrgRoleCleanup<'a> {
    pub fn new(
        op: &'a OperationConfig,
        nexus: &'a dyn NexusClient,
        iq: &'a dyn IqClient,
    ) -> Self {
        Self { op, nexus, iq }
    }

    /// Revoke the owner role when safe. Returns whether it was revoked.
    ///
    /// Skipped entirely when the organization id is empty.
    pub async fn run(&self) -> Result<bool, OperationError> {
        let username = &self.op.ldap_username;
        let organization_id = &self.op.organization_id;

        if organization_id.is_empty() {
            tracing::debug!(ldap_username = %username, "No organization id, skipping owner role cleanup");
            return Ok(false);
        }

        let Some(check) = self.evaluate().await? else {
            return Ok(false);
        };
        if !check.should_remove() {
            tracing::debug!(ldap_username = %username, ?check, "Keeping owner role");
            return Ok(false);
        }

        self.iq
            .remove_owner_role_from_user(self.op)
            .await
            .map_err(OperationError::upstream("remove owner role"))?;

        tracing::info!(
            ldap_username = %username,
            organization_id = %organization_id,
            "Removed owner role from user"
        );
        Ok(true)
    }

    #[cfg(test)]
    async fn should_remove_owner_role(&self) -> Result<bool, OperationError> {
        Ok(self.evaluate().await?.is_some_and(|c| c.should_remove()))
    }

    /// Gather the decision inputs from the user's current state. `None` when
    /// the user does not exist.
    async fn evaluate(&self) -> Result<Option<OwnerRemovalCheck>, OperationError> {
        let username = &self.op.ldap_username;

        let user = self
            .nexus
            .get_user(username)
            .await
            .map_err(OperationError::upstream(format!(
                "evaluate owner role removal: get user '{username}' failed"
            )))?;
        let Some(user) = user else {
            tracing::debug!(ldap_username = %username, "User not found while evaluating owner role removal");
            return Ok(None);
        };

        let mut roles = user.roles;
        if !self.op.role_name.is_empty() {
            roles.retain(|r| r != &self.op.role_name);
        }

        let engine = RoleDecisionEngine::new(&self.op.base_roles, &self.op.extra_roles)
            .with_after_removal(roles.clone());
        let shared_role_assigned = roles.iter().any(|r| r == SHARED_ROLE);

        let shared_role_empty = if shared_role_assigned {
            self.nexus
                .get_role(SHARED_ROLE)
                .await
                .map_err(OperationError::upstream(format!(
                    "evaluate owner role removal: get {SHARED_ROLE} role failed"
                )))?
                .map_or(true, |role| role.privileges.is_empty())
        } else {
            true
        };

        let check = OwnerRemovalCheck {
            has_other_roles: engine.has_other_roles(),
            shared_role_assigned,
            shared_role_empty,
            only_base_roles: only_base_roles(&roles, &self.op.base_roles),
        };
        tracing::debug!(ldap_username = %username, ?roles, ?check, "Owner role removal decision");
        Ok(Some(check))
    }
}
