//! Batch orchestrator.
//!
//! A submission is validated by the caller, then handed to
//! [`BatchManager::process_batch_async`], which records a job and returns at
//! once. The batch itself runs as one detached task: one spawned task per
//! valid request, joined before the job is finalized.

use std::sync::Arc;

use futures::future::join_all;
use provisioner_clients::{IqClient, NexusClient};
use provisioner_core::job::{JobStatus, JobStore};
use provisioner_core::operation::OperationConfig;
use provisioner_core::request::{Action, FailedRequest, RepositoryRequest};
use provisioner_core::settings::ProvisioningSettings;
use provisioner_core::types::JobId;
use provisioner_core::validation::ValidationResult;
use serde::Serialize;
use uuid::Uuid;

use crate::creation::CreationWorkflow;
use crate::deletion::DeletionWorkflow;
use crate::error::OperationError;
use crate::org_cleanup::OrgRoleCleanup;
use crate::progress::JobProgressTracker;
use crate::locks::ResourceLocks;
use crate::summary::OperationSummary;

/// What the submitter learns synchronously about a queued batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTicket {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_requests: usize,
    pub valid_requests: usize,
    pub invalid_requests: usize,
}

/// Runs batches against the resource clients and records their outcome.
///
/// Cheap to clone; every clone shares the job store and the role and user lock maps.
#[derive(Clone)]
pub struct BatchManager {
    settings: Arc<ProvisioningSettings>,
    jobs: Arc<JobStore>,
    nexus: Arc<dyn NexusClient>,
    iq: Arc<dyn IqClient>,
    locks: Arc<ResourceLocks>,
}

impl BatchManager {
    pub fn new(
        settings: Arc<ProvisioningSettings>,
        jobs: Arc<JobStore>,
        nexus: Arc<dyn NexusClient>,
        iq: Arc<dyn IqClient>,
    ) -> Self {
        Self {
            settings,
            jobs,
            nexus,
            iq,
            locks: Arc::new(ResourceLocks::new()),
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Create a job for the valid requests and start processing them in the
    /// background. Returns as soon as the job exists.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn process_batch_async(
        &self,
        validation: &ValidationResult,
        action: Action,
    ) -> BatchTicket {
        let job_id = Uuid::new_v4();
        let valid_requests = validation.valid.len();
        let job = self.jobs.create_job(job_id, action, valid_requests).await;

        tracing::info!(
            job_id = %job_id,
            action = %action,
            valid_requests,
            invalid_requests = validation.invalid.len(),
            "Batch job queued"
        );

        let manager = self.clone();
        let requests = validation.valid.clone();
        tokio::spawn(async move {
            manager.run_batch(job_id, action, requests).await;
        });

        BatchTicket {
            job_id,
            status: job.status,
            total_requests: validation.total(),
            valid_requests,
            invalid_requests: validation.invalid.len(),
        }
    }

    /// Process every request concurrently and finalize the job.
    pub async fn run_batch(&self, job_id: JobId, action: Action, requests: Vec<RepositoryRequest>) {
        let tracker = JobProgressTracker::new(Arc::clone(&self.jobs), job_id);
        tracker.set_processing().await;

        let total = requests.len();
        if requests.is_empty() {
            tracing::warn!(job_id = %job_id, "Batch has no requests to process");
            tracker.mark_failed(total).await;
            return;
        }

        tracing::debug!(job_id = %job_id, action = %action, request_count = total, "Starting batch processing");

        let handles = requests.iter().cloned().map(|request| {
            let manager = self.clone();
            tokio::spawn(async move { manager.attempt_operation(action, &request).await })
        });
        let outcomes = join_all(handles).await;

        let mut successful = 0;
        let mut failed_requests = Vec::new();
        for (request, outcome) in requests.into_iter().zip(outcomes) {
            let reason = match outcome {
                Ok(Ok(summary)) => {
                    tracing::info!(
                        job_id = %job_id,
                        action = %summary.action,
                        mode = summary.mode.as_str(),
                        repository_name = %summary.repository_name,
                        ldap_username = %summary.ldap_username,
                        "Operation succeeded"
                    );
                    successful += 1;
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        job_id = %job_id,
                        action = %action,
                        ldap_username = %request.ldap_username,
                        package_manager = %request.package_manager,
                        error = %e,
                        "Operation failed"
                    );
                    e.to_string()
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Operation task aborted");
                    format!("operation task aborted: {e}")
                }
            };
            failed_requests.push(FailedRequest { request, reason });
        }

        let failed = failed_requests.len();
        tracker
            .finalize(successful, failed, 0, total, failed_requests)
            .await;
    }

    /// Run one request end to end: resolve it, run the matching workflow,
    /// then the organization-role step.
    pub async fn attempt_operation(
        &self,
        action: Action,
        request: &RepositoryRequest,
    ) -> Result<OperationSummary, OperationError> {
        let op = self.settings.resolve(request, action)?;
        tracing::debug!(
            repository_name = %op.repository_name,
            action = %action,
            package_manager = %op.package_manager,
            "Resolved operation"
        );

        match action {
            Action::Create => {
                let summary = CreationWorkflow::new(&op, self.nexus.as_ref(), &self.locks)
                    .run()
                    .await?;
                self.grant_owner_role(&op).await?;
                Ok(summary)
            }
            Action::Delete => {
                let summary = DeletionWorkflow::new(&op, self.nexus.as_ref(), &self.locks)
                    .run()
                    .await?;
                OrgRoleCleanup::new(&op, self.nexus.as_ref(), self.iq.as_ref())
                    .run()
                    .await?;
                Ok(summary)
            }
        }
    }

    async fn grant_owner_role(&self, op: &OperationConfig) -> Result<(), OperationError> {
        if op.organization_id.is_empty() {
            tracing::warn!(
                ldap_username = %op.ldap_username,
                "No organization id, skipping owner role assignment"
            );
            return Ok(());
        }

        self.iq
            .add_owner_role_to_user(op)
            .await
            .map_err(OperationError::upstream(format!(
                "assign owner role to '{}' in organization '{}'",
                op.ldap_username, op.organization_id
            )))?;

        tracing::info!(
            ldap_username = %op.ldap_username,
            organization_id = %op.organization_id,
            "Assigned owner role"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use provisioner_clients::testing::{InMemoryIq, InMemoryNexus};
    use provisioner_core::job::Job;
    use provisioner_core::roles::{SHARED_ROLE, USER_STATUS_DISABLED};
    use provisioner_core::validation::validate_batch;

    use super::*;
    use crate::test_support::{request, settings, BASE_ROLE, ORG_ID};

    fn manager(nexus: &Arc<InMemoryNexus>, iq: &Arc<InMemoryIq>) -> BatchManager {
        BatchManager::new(
            Arc::new(settings()),
            Arc::new(JobStore::new()),
            Arc::clone(nexus) as Arc<dyn NexusClient>,
            Arc::clone(iq) as Arc<dyn IqClient>,
        )
    }

    async fn wait_for_completion(manager: &BatchManager, job_id: JobId) -> Job {
        let poll = async {
            loop {
                if let Some(job) = manager.jobs().get_job(&job_id).await {
                    if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
                        return job;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), poll)
            .await
            .expect("batch finished in time")
    }

    // ---- Queueing ----

    #[tokio::test]
    async fn ticket_reports_validation_counts() {
        let nexus = Arc::new(InMemoryNexus::new().with_user("alice", &[]));
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);

        let requests = vec![
            request("alice", "npm", false, "a1"),
            request("alice", "npm", true, "not-allowed"),
        ];
        let validation = validate_batch(&requests, Action::Create);

        let ticket = manager.process_batch_async(&validation, Action::Create).await;

        assert_eq!(ticket.status, JobStatus::Pending);
        assert_eq!(ticket.total_requests, 2);
        assert_eq!(ticket.valid_requests, 1);
        assert_eq!(ticket.invalid_requests, 1);

        let job = wait_for_completion(&manager, ticket.job_id).await;
        assert_eq!(job.total_requests, 1);
        assert_eq!(job.status, JobStatus::Completed);
    }

    // ---- Creation batches ----

    #[tokio::test]
    async fn bad_organization_fails_only_its_request() {
        let nexus = Arc::new(
            InMemoryNexus::new()
                .with_user("alice", &[])
                .with_user("bob", &[])
                .with_user("carol", &[]),
        );
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);

        let mut bad = request("carol", "npm", false, "a3");
        bad.organization_name = "bad-org".into();
        let requests = vec![
            request("alice", "npm", false, "a1"),
            request("bob", "maven", false, "a2"),
            bad.clone(),
        ];
        let validation = validate_batch(&requests, Action::Create);

        let ticket = manager.process_batch_async(&validation, Action::Create).await;
        let job = wait_for_completion(&manager, ticket.job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.successful_operations, 2);
        assert_eq!(job.failed_operations, 1);
        assert_eq!(job.not_processed_operations, 0);
        assert!(job.counts_balance());
        assert_eq!(job.failed_requests.len(), 1);
        assert_eq!(job.failed_requests[0].request, bad);
        assert_eq!(
            job.failed_requests[0].reason,
            "organization 'bad-org' not found"
        );
        assert_eq!(job.message, "Processed 2 of 3 requests with 1 errors");
    }

    #[tokio::test]
    async fn every_request_failing_fails_the_job() {
        let nexus = Arc::new(InMemoryNexus::new());
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);

        let requests = vec![
            request("ghost-1", "npm", false, "a1"),
            request("ghost-2", "npm", false, "a2"),
        ];
        let validation = validate_batch(&requests, Action::Create);

        let ticket = manager.process_batch_async(&validation, Action::Create).await;
        let job = wait_for_completion(&manager, ticket.job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failed_operations, 2);
        assert_eq!(job.message, "All 2 requests failed");
        assert!(job
            .failed_requests
            .iter()
            .all(|f| f.reason.starts_with("user 'ghost-")));
    }

    #[tokio::test]
    async fn same_user_requests_in_one_batch_keep_every_role() {
        let nexus = Arc::new(
            InMemoryNexus::new()
                .with_latency(Duration::from_millis(3))
                .with_user("alice", &[]),
        );
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);

        let requests = vec![
            request("alice", "npm", false, "a1"),
            request("alice", "npm", true, ""),
        ];
        let validation = validate_batch(&requests, Action::Create);
        let ticket = manager.process_batch_async(&validation, Action::Create).await;

        let job = wait_for_completion(&manager, ticket.job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.successful_operations, 2);

        let roles = nexus.user("alice").unwrap().roles;
        assert!(roles.contains(&"alice".to_string()));
        assert!(roles.contains(&SHARED_ROLE.to_string()));
    }

    #[tokio::test]
    async fn create_grants_owner_role() {
        let nexus = Arc::new(InMemoryNexus::new().with_user("alice", &[]));
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);

        manager
            .attempt_operation(Action::Create, &request("alice", "npm", false, "a1"))
            .await
            .unwrap();

        assert!(iq.is_owner(ORG_ID, "alice"));
    }

    #[tokio::test]
    async fn create_without_organization_id_skips_owner_role() {
        let nexus = Arc::new(InMemoryNexus::new().with_user("alice", &[]));
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);

        let mut req = request("alice", "npm", false, "a1");
        req.organization_name = "no-id-org".into();
        manager.attempt_operation(Action::Create, &req).await.unwrap();

        assert!(iq.calls().is_empty());
    }

    #[tokio::test]
    async fn owner_grant_failure_fails_the_request() {
        let nexus = Arc::new(InMemoryNexus::new().with_user("alice", &[]));
        let iq = Arc::new(InMemoryIq::new().fail("add_owner_role_to_user"));
        let manager = manager(&nexus, &iq);

        let err = manager
            .attempt_operation(Action::Create, &request("alice", "npm", false, "a1"))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("assign owner role to 'alice'"));
        assert_eq!(nexus.repository_names(), vec!["npm-release-a1".to_string()]);
    }

    // ---- Deletion batches ----

    #[tokio::test]
    async fn offboarding_sweeps_app_resources_and_disables_user() {
        let nexus = Arc::new(
            InMemoryNexus::new()
                .with_repository("npm-release-app-9")
                .with_repository("maven-release-app-9")
                .with_repository("npm-release-app-10")
                .with_privilege("npm-release-app-9")
                .with_privilege("maven-release-app-9")
                .with_privilege("npm-release-app-10")
                .with_user("alice", &[BASE_ROLE, "alice", "team-x"]),
        );
        let iq = Arc::new(InMemoryIq::new().with_owner(ORG_ID, "alice"));
        let manager = manager(&nexus, &iq);

        let requests = vec![request("alice", "", true, "app-9")];
        let validation = validate_batch(&requests, Action::Delete);
        assert_eq!(validation.valid.len(), 1);

        let ticket = manager.process_batch_async(&validation, Action::Delete).await;
        let job = wait_for_completion(&manager, ticket.job_id).await;

        assert_eq!(job.status, JobStatus::Completed, "{:?}", job.failed_requests);
        assert_eq!(
            nexus.repository_names(),
            vec!["npm-release-app-10".to_string()]
        );
        assert_eq!(
            nexus.privilege_names(),
            vec!["npm-release-app-10".to_string()]
        );

        let user = nexus.user("alice").unwrap();
        assert_eq!(user.status, USER_STATUS_DISABLED);
        assert_eq!(user.roles, vec![BASE_ROLE.to_string()]);
        assert!(!iq.is_owner(ORG_ID, "alice"));
    }

    #[tokio::test]
    async fn standard_delete_keeps_owner_while_other_roles_remain() {
        let nexus = Arc::new(
            InMemoryNexus::new()
                .with_repository("npm-release-a1")
                .with_privilege("npm-release-a1")
                .with_role("alice", &["npm-release-a1"])
                .with_user("alice", &[BASE_ROLE, "alice", "team-x"]),
        );
        let iq = Arc::new(InMemoryIq::new().with_owner(ORG_ID, "alice"));
        let manager = manager(&nexus, &iq);

        let summary = manager
            .attempt_operation(Action::Delete, &request("alice", "npm", false, "a1"))
            .await
            .unwrap();

        assert_eq!(summary.repository_name, "npm-release-a1");
        assert!(nexus.repository_names().is_empty());
        assert!(iq.is_owner(ORG_ID, "alice"));
    }

    #[tokio::test]
    async fn empty_batch_is_marked_failed() {
        let nexus = Arc::new(InMemoryNexus::new());
        let iq = Arc::new(InMemoryIq::new());
        let manager = manager(&nexus, &iq);
        let job_id = Uuid::new_v4();
        manager.jobs().create_job(job_id, Action::Create, 0).await;

        manager.run_batch(job_id, Action::Create, Vec::new()).await;

        let job = manager.jobs().get_job(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.counts_balance());
    }
}
