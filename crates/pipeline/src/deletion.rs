//! Deletion workflow.
//!
//! Three modes, chosen from the resolved operation:
//!
//! - **Offboarding** (`shared` with an app id): disable the user and reset
//!   them to base roles, force-delete their personal role, then sweep every
//!   repository and privilege whose name ends in `-release-{app_id}`. Sweep
//!   failures are logged and skipped.
//! - **Shared role** (role is the shared role): only the user's role list is
//!   reconciled.
//! - **Standard**: delete repository, privilege, the role if it is now
//!   empty, then reconcile the user's roles. The first failure stops the run.

use provisioner_clients::NexusClient;
use provisioner_core::operation::{app_suffix, OperationConfig};
use provisioner_core::role_engine::RoleDecisionEngine;
use provisioner_core::roles::{SHARED_ROLE, USER_STATUS_DISABLED};

use crate::error::OperationError;
use crate::locks::ResourceLocks;
use crate::summary::{OperationMode, OperationSummary};

/// Result of the offboarding name-pattern sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted_repositories: Vec<String>,
    pub deleted_privileges: Vec<String>,
    /// Names whose deletion failed; the sweep continued past them.
    pub failed: Vec<String>,
}

pub struct DeletionWorkflow<'a> {
    op: &'a OperationConfig,
    nexus: &'a dyn NexusClient,
    locks: &'a ResourceLocks,
}

impl<'a> DeletionWorkflow<'a> {
    pub fn new(
        op: &'a OperationConfig,
        nexus: &'a dyn NexusClient,
        locks: &'a ResourceLocks,
    ) -> Self {
        Self { op, nexus, locks }
    }

    pub fn mode(&self) -> OperationMode {
        if self.op.is_offboarding() {
            OperationMode::Offboarding
        } else if self.op.role_name == SHARED_ROLE {
            OperationMode::SharedRole
        } else {
            OperationMode::Standard
        }
    }

    pub async fn run(&self) -> Result<OperationSummary, OperationError> {
        let mode = self.mode();
        tracing::debug!(
            repository_name = %self.op.repository_name,
            ldap_username = %self.op.ldap_username,
            mode = mode.as_str(),
            "Deletion workflow started"
        );

        match mode {
            OperationMode::Offboarding => {
                self.offboard().await?;
            }
            OperationMode::SharedRole => {
                self.cleanup_user_roles().await?;
            }
            OperationMode::Standard => {
                self.delete_repository(&self.op.repository_name).await?;
                self.delete_privilege(&self.op.privilege_name).await?;
                self.cleanup_role().await?;
                self.cleanup_user_roles().await?;
            }
        }

        Ok(OperationSummary::new(self.op, mode))
    }

    async fn offboard(&self) -> Result<SweepReport, OperationError> {
        tracing::info!(
            ldap_username = %self.op.ldap_username,
            app_id = %self.op.app_id,
            "Offboarding user"
        );

        self.disable_user_and_reset_roles().await?;

        if let Err(e) = self.force_delete_role(&self.op.ldap_username).await {
            tracing::warn!(
                role_name = %self.op.ldap_username,
                error = %e,
                "Failed to delete user role during offboarding"
            );
        }

        let report = self.sweep_app_resources().await?;
        tracing::info!(
            ldap_username = %self.op.ldap_username,
            app_id = %self.op.app_id,
            repositories = report.deleted_repositories.len(),
            privileges = report.deleted_privileges.len(),
            failures = report.failed.len(),
            "Offboarding sweep finished"
        );
        Ok(report)
    }

    /// Delete every repository and privilege belonging to the app.
    ///
    /// Listing failures abort; individual deletion failures are recorded in
    /// the report and skipped.
    pub async fn sweep_app_resources(&self) -> Result<SweepReport, OperationError> {
        let suffix = app_suffix(&self.op.app_id);
        let mut report = SweepReport::default();

        let repositories = self
            .nexus
            .get_repositories()
            .await
            .map_err(OperationError::upstream("offboarding: failed to list repositories"))?;
        for repository in repositories.iter().filter(|r| r.name.ends_with(&suffix)) {
            match self.delete_repository(&repository.name).await {
                Ok(()) => report.deleted_repositories.push(repository.name.clone()),
                Err(e) => {
                    tracing::warn!(repository_name = %repository.name, error = %e, "Failed to delete repository during offboarding");
                    report.failed.push(repository.name.clone());
                }
            }
        }

        let privileges = self
            .nexus
            .get_privileges()
            .await
            .map_err(OperationError::upstream("offboarding: failed to list privileges"))?;
        for privilege in privileges.iter().filter(|p| p.name.ends_with(&suffix)) {
            match self.delete_privilege(&privilege.name).await {
                Ok(()) => report.deleted_privileges.push(privilege.name.clone()),
                Err(e) => {
                    tracing::warn!(privilege_name = %privilege.name, error = %e, "Failed to delete privilege during offboarding");
                    report.failed.push(privilege.name.clone());
                }
            }
        }

        Ok(report)
    }

    /// Absent repositories count as deleted.
    pub async fn delete_repository(&self, name: &str) -> Result<(), OperationError> {
        self.nexus
            .delete_repository(name)
            .await
            .map_err(OperationError::upstream(format!("delete repository '{name}'")))?;
        tracing::info!(repository_name = %name, "Deleted proxy repository");
        Ok(())
    }

    pub async fn delete_privilege(&self, name: &str) -> Result<(), OperationError> {
        self.nexus
            .delete_privilege(name)
            .await
            .map_err(OperationError::upstream(format!("delete privilege '{name}'")))?;
        tracing::info!(privilege_name = %name, "Deleted repository privilege");
        Ok(())
    }

    /// Delete the role only once it holds no privileges.
    ///
    /// A role that still grants something is left alone so other access it
    /// carries is not broken.
    pub async fn cleanup_role(&self) -> Result<(), OperationError> {
        let role_name = &self.op.role_name;
        let _guard = self.locks.role(role_name).await;

        let role = self
            .nexus
            .get_role(role_name)
            .await
            .map_err(OperationError::upstream(format!(
                "cleanup role '{role_name}': get role failed"
            )))?;

        match role {
            None => {
                tracing::debug!(role_name = %role_name, "Role not found, nothing to clean up");
            }
            Some(role) if !role.privileges.is_empty() => {
                tracing::debug!(
                    role_name = %role_name,
                    privilege_count = role.privileges.len(),
                    "Role still has privileges, keeping it"
                );
            }
            Some(_) => {
                self.nexus
                    .delete_role(role_name)
                    .await
                    .map_err(OperationError::upstream(format!(
                        "cleanup role '{role_name}': delete empty role failed"
                    )))?;
                tracing::info!(role_name = %role_name, "Deleted empty role");
            }
        }
        Ok(())
    }

    /// Delete a role regardless of its contents.
    pub async fn force_delete_role(&self, role_name: &str) -> Result<(), OperationError> {
        self.nexus
            .delete_role(role_name)
            .await
            .map_err(OperationError::upstream(format!("force delete role '{role_name}'")))
    }

    /// Reset the user to base roles only and mark them disabled.
    pub async fn disable_user_and_reset_roles(&self) -> Result<(), OperationError> {
        let username = &self.op.ldap_username;
        let _guard = self.locks.user(username).await;

        let mut user = self
            .nexus
            .get_user(username)
            .await
            .map_err(OperationError::upstream(format!(
                "disable user '{username}': get user failed"
            )))?
            .ok_or_else(|| OperationError::UserNotFound(username.clone()))?;

        user.roles = self
            .op
            .base_roles
            .iter()
            .filter(|r| !r.is_empty())
            .cloned()
            .collect();
        user.status = USER_STATUS_DISABLED.to_string();

        self.nexus
            .update_user(&user)
            .await
            .map_err(OperationError::upstream(format!(
                "disable user '{username}': update failed"
            )))?;

        tracing::info!(ldap_username = %username, "User disabled and roles reset");
        Ok(())
    }

    /// Remove the target role from the user when it no longer grants
    /// anything, then let the role engine decide the final role list.
    ///
    /// A missing user is logged and skipped. Holds the user's lock for the
    /// whole read-modify-write.
    pub async fn cleanup_user_roles(&self) -> Result<(), OperationError> {
        let username = &self.op.ldap_username;
        let role_name = &self.op.role_name;
        let _guard = self.locks.user(username).await;

        let user = self
            .nexus
            .get_user(username)
            .await
            .map_err(OperationError::upstream(format!(
                "cleanup user roles for '{username}': get user failed"
            )))?;
        let Some(mut user) = user else {
            tracing::warn!(ldap_username = %username, "User not found, skipping role cleanup");
            return Ok(());
        };

        let mut roles = user.roles.clone();
        if !role_name.is_empty() {
            let role = self
                .nexus
                .get_role(role_name)
                .await
                .map_err(OperationError::upstream(format!(
                    "cleanup user roles for '{username}': get role '{role_name}' failed"
                )))?;

            let still_grants = role.is_some_and(|r| !r.privileges.is_empty());
            if still_grants {
                tracing::debug!(
                    ldap_username = %username,
                    role_name = %role_name,
                    "Role still has privileges, keeping it on the user"
                );
            } else {
                roles.retain(|r| r != role_name);
            }
        }

        let engine = RoleDecisionEngine::new(&self.op.base_roles, &self.op.extra_roles)
            .with_after_removal(roles);
        if engine.has_other_roles() {
            tracing::debug!(ldap_username = %username, "Other roles present, keeping extra roles");
        } else {
            tracing::info!(
                ldap_username = %username,
                removed_extra_roles = ?engine.removed_extra_roles(),
                "No project roles left, removing extra roles"
            );
        }
        user.roles = engine.decide_final_roles();

        self.nexus
            .update_user(&user)
            .await
            .map_err(OperationError::upstream(format!(
                "cleanup user roles for '{username}': update user failed"
            )))?;

        tracing::info!(ldap_username = %username, role_name = %role_name, "Updated user roles after cleanup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use provisioner_clients::testing::InMemoryNexus;
    use provisioner_core::request::Action;

    use super::*;
    use crate::test_support::{op, BASE_ROLE, EXTRA_ROLE};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    // ---- Mode selection ----

    #[test]
    fn mode_follows_shared_and_app_id() {
        let nexus = InMemoryNexus::new();
        let locks = ResourceLocks::new();

        let standard = op(Action::Delete, "alice", "npm", false, "a1");
        assert_eq!(
            DeletionWorkflow::new(&standard, &nexus, &locks).mode(),
            OperationMode::Standard
        );

        let offboarding = op(Action::Delete, "alice", "", true, "app-9");
        assert_eq!(
            DeletionWorkflow::new(&offboarding, &nexus, &locks).mode(),
            OperationMode::Offboarding
        );

        let shared = op(Action::Delete, "alice", "npm", true, "");
        assert_eq!(
            DeletionWorkflow::new(&shared, &nexus, &locks).mode(),
            OperationMode::SharedRole
        );
    }

    // ---- Standard ----

    #[tokio::test]
    async fn standard_delete_removes_resources_and_last_project_role() {
        let nexus = InMemoryNexus::new()
            .with_repository("npm-release-a1")
            .with_privilege("npm-release-a1")
            .with_role("alice", &[])
            .with_user("alice", &[BASE_ROLE, "alice", EXTRA_ROLE]);
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "npm", false, "a1");

        let summary = DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap();

        assert_eq!(summary.mode, OperationMode::Standard);
        assert!(nexus.repository_names().is_empty());
        assert!(nexus.privilege_names().is_empty());
        assert!(nexus.role("alice").is_none());
        assert_eq!(nexus.user("alice").unwrap().roles, strings(&[BASE_ROLE]));
    }

    #[tokio::test]
    async fn role_with_remaining_privileges_is_kept() {
        let nexus = InMemoryNexus::new()
            .with_role("alice", &["maven-release-a2"])
            .with_user("alice", &[BASE_ROLE, "alice", EXTRA_ROLE]);
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "npm", false, "a1");

        DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap();

        assert!(nexus.role("alice").is_some());
        assert_eq!(nexus.count("delete_role"), 0);
        assert_eq!(
            nexus.user("alice").unwrap().roles,
            strings(&[BASE_ROLE, "alice", EXTRA_ROLE])
        );
    }

    #[tokio::test]
    async fn deleting_absent_resources_succeeds() {
        let nexus = InMemoryNexus::new();
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "npm", false, "a1");

        DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap();

        assert_eq!(nexus.count("delete_repository"), 1);
        assert_eq!(nexus.count("delete_privilege"), 1);
        assert_eq!(nexus.count("update_user"), 0);
    }

    #[tokio::test]
    async fn standard_failure_stops_later_steps() {
        let nexus = InMemoryNexus::new()
            .with_user("alice", &["alice"])
            .fail("delete_repository");
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "npm", false, "a1");

        let err = DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap_err();

        assert_matches!(err, OperationError::Upstream { .. });
        assert_eq!(nexus.count("delete_privilege"), 0);
        assert_eq!(nexus.count("update_user"), 0);
    }

    // ---- Shared role ----

    #[tokio::test]
    async fn shared_role_mode_only_touches_the_user() {
        let nexus = InMemoryNexus::new()
            .with_repository("npm-release-shared")
            .with_role(SHARED_ROLE, &[])
            .with_user("alice", &[BASE_ROLE, SHARED_ROLE, EXTRA_ROLE]);
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "npm", true, "");

        let summary = DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap();

        assert_eq!(summary.mode, OperationMode::SharedRole);
        assert_eq!(nexus.repository_names(), strings(&["npm-release-shared"]));
        assert_eq!(nexus.count("delete_role"), 0);
        assert_eq!(nexus.user("alice").unwrap().roles, strings(&[BASE_ROLE]));
    }

    // ---- Offboarding ----

    #[tokio::test]
    async fn offboarding_sweeps_only_matching_resources() {
        let nexus = InMemoryNexus::new()
            .with_repository("npm-release-app-9")
            .with_repository("maven-release-app-9")
            .with_repository("npm-release-app-90")
            .with_privilege("npm-release-app-9")
            .with_privilege("maven-release-app-9")
            .with_privilege("npm-release-app-90")
            .with_role("alice", &["npm-release-app-9"])
            .with_user("alice", &[BASE_ROLE, "alice", EXTRA_ROLE, SHARED_ROLE]);
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "", true, "app-9");

        let summary = DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap();

        assert_eq!(summary.mode, OperationMode::Offboarding);
        assert_eq!(nexus.repository_names(), strings(&["npm-release-app-90"]));
        assert_eq!(nexus.privilege_names(), strings(&["npm-release-app-90"]));
        assert!(nexus.role("alice").is_none());

        let user = nexus.user("alice").unwrap();
        assert_eq!(user.status, USER_STATUS_DISABLED);
        assert_eq!(user.roles, strings(&[BASE_ROLE]));
    }

    #[tokio::test]
    async fn offboarding_continues_past_deletion_failures() {
        let nexus = InMemoryNexus::new()
            .with_repository("npm-release-app-9")
            .with_privilege("npm-release-app-9")
            .with_user("alice", &["alice"])
            .fail("delete_repository")
            .fail("delete_role");
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "", true, "app-9");
        let workflow = DeletionWorkflow::new(&op, &nexus, &locks);

        workflow.run().await.unwrap();

        assert_eq!(nexus.repository_names(), strings(&["npm-release-app-9"]));
        assert!(nexus.privilege_names().is_empty());

        let report = workflow.sweep_app_resources().await.unwrap();
        assert_eq!(report.failed, strings(&["npm-release-app-9"]));
    }

    #[tokio::test]
    async fn offboarding_unknown_user_fails() {
        let nexus = InMemoryNexus::new().with_repository("npm-release-app-9");
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "ghost", "", true, "app-9");

        let err = DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap_err();

        assert_matches!(err, OperationError::UserNotFound(_));
        assert_eq!(nexus.repository_names(), strings(&["npm-release-app-9"]));
    }

    #[tokio::test]
    async fn offboarding_list_failure_aborts() {
        let nexus = InMemoryNexus::new()
            .with_user("alice", &[])
            .fail("get_repositories");
        let locks = ResourceLocks::new();
        let op = op(Action::Delete, "alice", "", true, "app-9");

        let err = DeletionWorkflow::new(&op, &nexus, &locks).run().await.unwrap_err();

        assert!(err.to_string().contains("failed to list repositories"));
    }
}
