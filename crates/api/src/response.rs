//! Response bodies shared by the batch handlers.

use provisioner_core::job::JobStatus;
use provisioner_core::types::JobId;
use provisioner_core::validation::{InvalidRequest, ValidationResult};
use serde::Serialize;

pub const MESSAGE_JOB_ACCEPTED: &str = "Job queued for processing";

/// One rejected request, flattened with its reasons.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedValidation {
    pub organization_name: String,
    pub ldap_username: String,
    pub package_manager: String,
    pub shared: bool,
    pub app_id: String,
    pub validation_errors: Vec<String>,
}

impl From<InvalidRequest> for FailedValidation {
    fn from(invalid: InvalidRequest) -> Self {
        let request = invalid.request;
        Self {
            organization_name: request.organization_name,
            ldap_username: request.ldap_username,
            package_manager: request.package_manager,
            shared: request.shared,
            app_id: request.app_id,
            validation_errors: invalid.reasons,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_requests: usize,
    pub valid_requests: usize,
    pub invalid_requests: usize,
    pub failed_validations: Vec<FailedValidation>,
}

impl From<ValidationResult> for ValidationSummary {
    fn from(result: ValidationResult) -> Self {
        Self {
            total_requests: result.total(),
            valid_requests: result.valid.len(),
            invalid_requests: result.invalid.len(),
            failed_validations: result.invalid.into_iter().map(Into::into).collect(),
        }
    }
}

/// `202 Accepted` body for a queued batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAccepted {
    pub success: bool,
    pub message: &'static str,
    pub job_id: JobId,
    pub status: JobStatus,
    pub validation: ValidationSummary,
}
