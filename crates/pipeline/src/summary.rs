use serde::Serialize;

use provisioner_core::operation::OperationConfig;
use provisioner_core::request::Action;

/// Which path a workflow took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Per-user repository, privilege and role.
    Standard,
    /// The fixed shared role; no per-repository resources are touched on delete.
    SharedRole,
    /// Wide cleanup of everything belonging to one app, plus user disable.
    Offboarding,
}

impl OperationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::SharedRole => "shared_role",
            Self::Offboarding => "offboarding",
        }
    }
}

/// Outcome of one successful workflow run, logged by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub action: Action,
    pub mode: OperationMode,
    pub repository_name: String,
    pub ldap_username: String,
    pub organization_id: String,
    pub app_id: String,
}

impl OperationSummary {
    pub fn new(op: &OperationConfig, mode: OperationMode) -> Self {
        Self {
            action: op.action,
            mode,
            repository_name: op.repository_name.clone(),
            ldap_username: op.ldap_username.clone(),
            organization_id: op.organization_id.clone(),
            app_id: op.app_id.clone(),
        }
    }
}
