//! Job progress updates for one batch.

use std::sync::Arc;

use provisioner_core::job::{JobStatus, JobStore};
use provisioner_core::request::FailedRequest;
use provisioner_core::types::JobId;

pub const MESSAGE_PROCESSING: &str = "Processing requests";

/// Writes a batch's lifecycle transitions to its job record.
///
/// Store errors are logged, never propagated: a lost progress update must
/// not fail the batch itself.
pub struct JobProgressTracker {
    store: Arc<JobStore>,
    job_id: JobId,
}

impl JobProgressTracker {
    pub fn new(store: Arc<JobStore>, job_id: JobId) -> Self {
        Self { store, job_id }
    }

    pub async fn set_processing(&self) {
        let result = self
            .store
            .update_job(&self.job_id, |job| {
                job.status = JobStatus::Processing;
                job.message = MESSAGE_PROCESSING.to_string();
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to mark job processing");
        }
    }

    /// Record final counts and derive status and message.
    ///
    /// Completed when nothing failed or when at least one request succeeded;
    /// failed when every request failed.
    pub async fn finalize(
        &self,
        successful: usize,
        failed: usize,
        not_processed: usize,
        total: usize,
        failed_requests: Vec<FailedRequest>,
    ) {
        let (status, message) = final_status(successful, failed, total);
        let result = self
            .store
            .update_job(&self.job_id, |job| {
                job.successful_operations = successful;
                job.failed_operations = failed;
                job.not_processed_operations = not_processed;
                job.failed_requests = failed_requests;
                job.status = status;
                job.message = message;
            })
            .await;

        match result {
            Ok(()) => tracing::info!(
                job_id = %self.job_id,
                successful,
                failed,
                total,
                "Job finalized"
            ),
            Err(e) => tracing::warn!(job_id = %self.job_id, error = %e, "Failed to finalize job"),
        }
    }

    /// Mark every request failed without processing any.
    pub async fn mark_failed(&self, total: usize) {
        let result = self
            .store
            .update_job(&self.job_id, |job| {
                job.status = JobStatus::Failed;
                job.total_requests = total;
                job.successful_operations = 0;
                job.failed_operations = total;
                job.not_processed_operations = 0;
                job.message = format!("All {total} requests failed");
            })
            .await;

        match result {
            Ok(()) => tracing::info!(job_id = %self.job_id, total_requests = total, "Job marked as failed"),
            Err(e) => tracing::warn!(job_id = %self.job_id, error = %e, "Failed to mark job failed"),
        }
    }
}

fn final_status(successful: usize, failed: usize, total: usize) -> (JobStatus, String) {
    if failed == 0 {
        (
            JobStatus::Completed,
            format!("Successfully processed all {successful} requests"),
        )
    } else if successful == 0 {
        (JobStatus::Failed, format!("All {failed} requests failed"))
    } else {
        (
            JobStatus::Completed,
            format!("Processed {successful} of {total} requests with {failed} errors"),
        )
    }
}
