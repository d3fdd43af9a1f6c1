//! Role decision engine.
//!
//! Decides which roles a user keeps after a target role has been removed.
//!
//! - Base roles are always kept, so the user is never locked out.
//! - Extra roles are kept only while the user still holds at least one
//!   project role.
//! - Every other (project) role is kept untouched.

use crate::roles::SHARED_ROLE;

/// Pure decision function over role sets.
#[derive(Debug, Clone)]
pub struct RoleDecisionEngine {
    base_roles: Vec<String>,
    extra_roles: Vec<String>,
    after_removal: Vec<String>,
}

impl RoleDecisionEngine {
    /// Build an engine from the configured role lists. Empty names are dropped.
    pub fn new(base_roles: &[String], extra_roles: &[String]) -> Self {
        Self {
            base_roles: non_empty(base_roles),
            extra_roles: non_empty(extra_roles),
            after_removal: Vec::new(),
        }
    }

    /// Set the roles the user holds once the target role is gone.
    pub fn with_after_removal(mut self, roles: Vec<String>) -> Self {
        self.after_removal = roles;
        self
    }

    /// Whether the user still holds a project role: anything that is not a
    /// base role, the shared role, or an extra role.
    pub fn has_other_roles(&self) -> bool {
        self.after_removal.iter().any(|r| {
            !self.base_roles.contains(r) && r != SHARED_ROLE && !self.extra_roles.contains(r)
        })
    }

    /// Final role list: base roles first in configured order, then the
    /// remaining roles in their original order, skipping duplicates. Extra
    /// roles survive only when [`has_other_roles`](Self::has_other_roles).
    pub fn decide_final_roles(&self) -> Vec<String> {
        let keep_extra = self.has_other_roles();
        let mut final_roles: Vec<String> = Vec::new();

        for role in &self.base_roles {
            if !final_roles.contains(role) {
                final_roles.push(role.clone());
            }
        }

        for role in &self.after_removal {
            if final_roles.contains(role) {
                continue;
            }
            if self.extra_roles.contains(role) && !keep_extra {
                continue;
            }
            final_roles.push(role.clone());
        }

        final_roles
    }

    /// Configured extra roles missing from the decided set. Used for audit logs.
    pub fn removed_extra_roles(&self) -> Vec<String> {
        let final_roles = self.decide_final_roles();
        self.extra_roles
            .iter()
            .filter(|r| !final_roles.contains(r))
            .cloned()
            .collect()
    }
}

fn non_empty(roles: &[String]) -> Vec<String> {
    roles.iter().filter(|r| !r.is_empty()).cloned().collect()
}
