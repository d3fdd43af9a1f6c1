//! Batch job records and the in-memory job store.
//!
//! Jobs live for the lifetime of the process only. The store is the single
//! owner of every record; callers read clones and mutate through
//! [`JobStore::update_job`].

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::request::{Action, FailedRequest};
use crate::types::{JobId, Timestamp};

/// Message on a freshly created job.
pub const MESSAGE_JOB_QUEUED: &str = "Job queued";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Aggregate progress and outcome of one batch submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub action: Action,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub total_requests: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub not_processed_operations: usize,
    pub failed_requests: Vec<FailedRequest>,
    pub message: String,
}

impl Job {
    /// `total == successful + failed + not_processed`.
    pub fn counts_balance(&self) -> bool {
        self.total_requests
            == self.successful_operations + self.failed_operations + self.not_processed_operations
    }
}

/// Concurrent-safe keyed job store.
///
/// Reads share the lock; creates and updates take it exclusively.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new pending job with every request counted as not processed.
    pub async fn create_job(&self, id: JobId, action: Action, total_requests: usize) -> Job {
        let now = chrono::Utc::now();
        let job = Job {
            id,
            status: JobStatus::Pending,
            action,
            created_at: now,
            updated_at: now,
            total_requests,
            successful_operations: 0,
            failed_operations: 0,
            not_processed_operations: total_requests,
            failed_requests: Vec::new(),
            message: MESSAGE_JOB_QUEUED.to_string(),
        };
        self.jobs.write().await.insert(id, job.clone());
        job
    }

    /// Snapshot of a job, or `None` when the id is unknown.
    pub async fn get_job(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Apply `mutate` under the write lock and refresh `updated_at`.
    pub async fn update_job<F>(&self, id: &JobId, mutate: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or_else(|| CoreError::NotFound {
            entity: "job",
            name: id.to_string(),
        })?;
        mutate(job);
        job.updated_at = chrono::Utc::now();
        Ok(())
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
