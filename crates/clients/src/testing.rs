//! In-memory fakes of both resource clients.
//!
//! The fakes keep just enough state to behave like the real services
//! (404-as-none lookups, idempotent deletes, duplicate role creation) and
//! record every call so tests can assert on side effects. Any operation can
//! be made to fail with [`InMemoryNexus::fail`] / [`InMemoryIq::fail`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use provisioner_core::operation::OperationConfig;
use provisioner_core::roles::OWNER_ROLE_NAME;

use crate::error::ClientError;
use crate::iq::{owner_role_id, IqClient};
use crate::models::{IqRole, Privilege, Repository, Role, User};
use crate::nexus::{
    privilege_format, privilege_payload, role_payload, NexusClient, PLACEHOLDER_EMAIL,
    PLACEHOLDER_LAST_NAME,
};

/// Id of the "Owner" role a default [`InMemoryIq`] carries.
pub const OWNER_ROLE_ID: &str = "owner-role-id";

/// One recorded client call: operation name and its main argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
}

fn injected(op: &'static str) -> ClientError {
    ClientError::Api {
        status: 500,
        body: format!("injected failure in {op}"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---- Repository manager ----

#[derive(Default)]
struct NexusState {
    repositories: BTreeMap<String, Repository>,
    privileges: BTreeMap<String, Privilege>,
    roles: BTreeMap<String, Role>,
    users: BTreeMap<String, User>,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
}

/// In-memory [`NexusClient`].
#[derive(Default)]
pub struct InMemoryNexus {
    state: Mutex<NexusState>,
    latency: Option<Duration>,
}

impl InMemoryNexus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every call, to widen race windows.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_user(self, user_id: &str, roles: &[&str]) -> Self {
        lock(&self.state).users.insert(
            user_id.to_string(),
            User {
                user_id: user_id.to_string(),
                first_name: user_id.to_string(),
                source: "LDAP".to_string(),
                status: "active".to_string(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_repository(self, name: &str) -> Self {
        lock(&self.state).repositories.insert(
            name.to_string(),
            Repository {
                name: name.to_string(),
                repo_type: "proxy".to_string(),
                online: true,
                ..Default::default()
            },
        );
        self
    }

    pub fn with_privilege(self, name: &str) -> Self {
        lock(&self.state).privileges.insert(
            name.to_string(),
            Privilege {
                name: name.to_string(),
                repository: name.to_string(),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_role(self, id: &str, privileges: &[&str]) -> Self {
        lock(&self.state).roles.insert(
            id.to_string(),
            Role {
                id: id.to_string(),
                name: id.to_string(),
                privileges: privileges.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    /// Make every call to `op` (a [`NexusClient`] method name) fail with a 500.
    pub fn fail(self, op: &'static str) -> Self {
        lock(&self.state).failing.insert(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    /// Targets of every recorded call to `op`, in call order.
    pub fn targets(&self, op: &str) -> Vec<String> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.targets(op).len()
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        lock(&self.state).users.get(user_id).cloned()
    }

    pub fn role(&self, id: &str) -> Option<Role> {
        lock(&self.state).roles.get(id).cloned()
    }

    pub fn repository_names(&self) -> Vec<String> {
        lock(&self.state).repositories.keys().cloned().collect()
    }

    pub fn privilege_names(&self) -> Vec<String> {
        lock(&self.state).privileges.keys().cloned().collect()
    }

    /// Record the call, then fail if `op` is marked failing.
    async fn enter(
        &self,
        op: &'static str,
        target: &str,
    ) -> Result<MutexGuard<'_, NexusState>, ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = lock(&self.state);
        state.calls.push(Call {
            op,
            target: target.to_string(),
        });
        if state.failing.contains(op) {
            return Err(injected(op));
        }
        Ok(state)
    }
}

#[async_trait]
impl NexusClient for InMemoryNexus {
    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, ClientError> {
        let state = self.enter("get_repository", name).await?;
        Ok(state.repositories.get(name).cloned())
    }

    async fn get_repositories(&self) -> Result<Vec<Repository>, ClientError> {
        let state = self.enter("get_repositories", "").await?;
        Ok(state.repositories.values().cloned().collect())
    }

    async fn create_proxy_repository(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let mut state = self
            .enter("create_proxy_repository", &op.repository_name)
            .await?;
        state.repositories.insert(
            op.repository_name.clone(),
            Repository {
                name: op.repository_name.clone(),
                format: op.package_manager.to_lowercase(),
                repo_type: "proxy".to_string(),
                url: op.remote_url.clone(),
                online: true,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn delete_repository(&self, name: &str) -> Result<(), ClientError> {
        let mut state = self.enter("delete_repository", name).await?;
        state.repositories.remove(name);
        Ok(())
    }

    async fn get_privilege(&self, name: &str) -> Result<Option<Privilege>, ClientError> {
        let state = self.enter("get_privilege", name).await?;
        Ok(state.privileges.get(name).cloned())
    }

    async fn get_privileges(&self) -> Result<Vec<Privilege>, ClientError> {
        let state = self.enter("get_privileges", "").await?;
        Ok(state.privileges.values().cloned().collect())
    }

    async fn create_privilege(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let mut state = self.enter("create_privilege", &op.privilege_name).await?;
        let privilege = privilege_payload(op, &privilege_format(&op.package_manager, None));
        state.privileges.insert(privilege.name.clone(), privilege);
        Ok(())
    }

    async fn delete_privilege(&self, name: &str) -> Result<(), ClientError> {
        let mut state = self.enter("delete_privilege", name).await?;
        state.privileges.remove(name);
        Ok(())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>, ClientError> {
        let state = self.enter("get_role", id).await?;
        Ok(state.roles.get(id).cloned())
    }

    async fn create_role(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let mut state = self.enter("create_role", &op.role_name).await?;
        let role = role_payload(op);
        state.roles.entry(role.id.clone()).or_insert(role);
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<(), ClientError> {
        if role.id.is_empty() {
            return Err(ClientError::MissingIdentifier("role id"));
        }
        let mut state = self.enter("update_role", &role.id).await?;
        state.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: &str) -> Result<(), ClientError> {
        let mut state = self.enter("delete_role", id).await?;
        state.roles.remove(id);
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, ClientError> {
        let state = self.enter("get_user", user_id).await?;
        Ok(state.users.get(user_id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), ClientError> {
        if user.user_id.is_empty() {
            return Err(ClientError::MissingIdentifier("userId"));
        }
        let mut state = self.enter("update_user", &user.user_id).await?;
        if !state.users.contains_key(&user.user_id) {
            return Err(ClientError::Api {
                status: 404,
                body: format!("user '{}' not found", user.user_id),
            });
        }
        state.users.insert(
            user.user_id.clone(),
            User {
                email_address: PLACEHOLDER_EMAIL.to_string(),
                last_name: PLACEHOLDER_LAST_NAME.to_string(),
                ..user.clone()
            },
        );
        Ok(())
    }
}

// ---- Policy server ----

struct IqState {
    roles: Vec<IqRole>,
    /// `(organization_id, role_id, user)`
    memberships: BTreeSet<(String, String, String)>,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
}

/// In-memory [`IqClient`]. Starts with a single "Owner" role whose id is
/// [`OWNER_ROLE_ID`].
pub struct InMemoryIq {
    state: Mutex<IqState>,
}

impl Default for InMemoryIq {
    fn default() -> Self {
        Self::with_roles(vec![IqRole {
            id: OWNER_ROLE_ID.to_string(),
            name: OWNER_ROLE_NAME.to_string(),
            ..Default::default()
        }])
    }
}

impl InMemoryIq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(roles: Vec<IqRole>) -> Self {
        Self {
            state: Mutex::new(IqState {
                roles,
                memberships: BTreeSet::new(),
                calls: Vec::new(),
                failing: HashSet::new(),
            }),
        }
    }

    /// Pre-grant the owner role to `user` in `organization_id`.
    pub fn with_owner(self, organization_id: &str, user: &str) -> Self {
        lock(&self.state).memberships.insert((
            organization_id.to_string(),
            OWNER_ROLE_ID.to_string(),
            user.to_string(),
        ));
        self
    }

    pub fn fail(self, op: &'static str) -> Self {
        lock(&self.state).failing.insert(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        lock(&self.state).calls.iter().filter(|c| c.op == op).count()
    }

    pub fn is_owner(&self, organization_id: &str, user: &str) -> bool {
        lock(&self.state)
            .memberships
            .iter()
            .any(|(org, _, u)| org == organization_id && u == user)
    }

    fn enter(
        &self,
        op: &'static str,
        target: &str,
    ) -> Result<MutexGuard<'_, IqState>, ClientError> {
        let mut state = lock(&self.state);
        state.calls.push(Call {
            op,
            target: target.to_string(),
        });
        if state.failing.contains(op) {
            return Err(injected(op));
        }
        Ok(state)
    }

    fn owner_role(state: &IqState) -> Result<String, ClientError> {
        owner_role_id(&state.roles)?.ok_or(ClientError::OwnerRoleNotFound)
    }
}

#[async_trait]
impl IqClient for InMemoryIq {
    async fn get_roles(&self) -> Result<Vec<IqRole>, ClientError> {
        Ok(self.enter("get_roles", "")?.roles.clone())
    }

    async fn find_owner_role_id(&self) -> Result<Option<String>, ClientError> {
        let state = self.enter("find_owner_role_id", "")?;
        owner_role_id(&state.roles)
    }

    async fn add_owner_role_to_user(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let mut state = self.enter("add_owner_role_to_user", &op.ldap_username)?;
        let role_id = Self::owner_role(&state)?;
        state.memberships.insert((
            op.organization_id.clone(),
            role_id,
            op.ldap_username.clone(),
        ));
        Ok(())
    }

    async fn remove_owner_role_from_user(&self, op: &OperationConfig) -> Result<(), ClientError> {
        let mut state = self.enter("remove_owner_role_from_user", &op.ldap_username)?;
        let role_id = Self::owner_role(&state)?;
        state.memberships.remove(&(
            op.organization_id.clone(),
            role_id,
            op.ldap_username.clone(),
        ));
        Ok(())
    }
}
