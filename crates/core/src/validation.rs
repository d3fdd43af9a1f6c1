//! Per-request batch validation.
//!
//! Each request is checked independently; invalid requests are collected with
//! their reasons and never abort the rest of the batch.

use serde::Serialize;

use crate::request::{Action, RepositoryRequest};

pub const REASON_PM_MUST_BE_EMPTY: &str =
    "packageManager must be empty for shared delete operations";
pub const REASON_PM_REQUIRED: &str = "packageManager is required for this operation type";
pub const REASON_APPID_NOT_ALLOWED: &str = "appid not allowed for shared repos on create";
pub const REASON_APPID_REQUIRED_OFFBOARDING: &str =
    "appid required for shared repos on delete (offboarding)";
pub const REASON_APPID_REQUIRED: &str = "appid required for non-shared repos";

/// A request rejected during validation, with every reason found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRequest {
    pub request: RepositoryRequest,
    pub reasons: Vec<String>,
}

/// Outcome of validating a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: Vec<RepositoryRequest>,
    pub invalid: Vec<InvalidRequest>,
}

impl ValidationResult {
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

/// Check one request against the rules for `action`.
///
/// | action | shared | packageManager | appId     |
/// |--------|--------|----------------|-----------|
/// | create | false  | required       | required  |
/// | create | true   | required       | must be empty |
/// | delete | false  | required       | required  |
/// | delete | true   | must be empty  | required (offboarding) |
pub fn validate_request(request: &RepositoryRequest, action: Action) -> Vec<String> {
    let mut reasons = Vec::new();
    let offboarding = action == Action::Delete && request.shared;

    if offboarding {
        if !request.package_manager.is_empty() {
            reasons.push(REASON_PM_MUST_BE_EMPTY.to_string());
        }
    } else if request.package_manager.is_empty() {
        reasons.push(REASON_PM_REQUIRED.to_string());
    }

    match (action, request.shared) {
        (Action::Create, true) if !request.app_id.is_empty() => {
            reasons.push(REASON_APPID_NOT_ALLOWED.to_string());
        }
        (Action::Delete, true) if request.app_id.is_empty() => {
            reasons.push(REASON_APPID_REQUIRED_OFFBOARDING.to_string());
        }
        (_, false) if request.app_id.is_empty() => {
            reasons.push(REASON_APPID_REQUIRED.to_string());
        }
        _ => {}
    }

    reasons
}

/// Partition a batch into valid and invalid requests, preserving order.
pub fn validate_batch(requests: &[RepositoryRequest], action: Action) -> ValidationResult {
    let mut result = ValidationResult::default();

    for request in requests {
        let reasons = validate_request(request, action);
        if reasons.is_empty() {
            result.valid.push(request.clone());
        } else {
            result.invalid.push(InvalidRequest {
                request: request.clone(),
                reasons,
            });
        }
    }

    result
}
