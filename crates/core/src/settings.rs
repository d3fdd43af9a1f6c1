//! Static provisioning settings loaded once at startup.
//!
//! Holds the organization map, the package manager catalogue, and the
//! base/extra role lists. Everything here is read-only after startup and
//! shared across all operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Endpoint used to create proxy repositories of one format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Path relative to the repository-manager base URL, e.g. `/v1/repositories/npm/proxy`.
    #[serde(alias = "Path")]
    #[validate(length(min = 1, message = "apiEndpoint.path is required"))]
    pub path: String,

    /// Format-specific payload fields. Win over `default_config` and base fields.
    #[serde(default, alias = "FormatSpecificConfig")]
    pub format_specific_config: serde_json::Map<String, serde_json::Value>,
}

/// Configuration for one repository format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PackageManager {
    /// Upstream registry URL the proxy repository points at.
    #[serde(alias = "defaultURL", alias = "DefaultURL")]
    #[validate(url(message = "defaultUrl must be a valid URL"))]
    pub default_url: String,

    /// Generic payload overrides applied on top of the computed base fields.
    #[serde(default, alias = "DefaultConfig")]
    pub default_config: serde_json::Map<String, serde_json::Value>,

    /// Explicit privilege format; falls back to the normalized format name.
    #[serde(default, alias = "PrivilegeFormat")]
    pub privilege_format: Option<String>,

    #[serde(alias = "APIEndpoint")]
    #[validate(nested)]
    pub api_endpoint: ApiEndpoint,
}

/// Static settings every operation is resolved against.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningSettings {
    /// Organization name -> policy server organization id.
    pub organizations: HashMap<String, String>,
    /// Format name -> package manager configuration.
    pub package_managers: HashMap<String, PackageManager>,
    /// Roles every user always keeps.
    pub base_roles: Vec<String>,
    /// Roles granted alongside project access.
    pub extra_roles: Vec<String>,
}

impl ProvisioningSettings {
    /// Validate every package manager entry, reporting the first offender by name.
    pub fn validate_package_managers(&self) -> Result<(), CoreError> {
        for (name, manager) in &self.package_managers {
            manager.validate().map_err(|e| {
                CoreError::Validation(format!("package manager '{name}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// Split a comma-separated role list, trimming whitespace and dropping empties.
pub fn parse_roles(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roles_trims_and_drops_empty() {
        assert_eq!(
            parse_roles(" nx-anonymous , ,developer,"),
            vec!["nx-anonymous".to_string(), "developer".to_string()]
        );
        assert!(parse_roles("   ").is_empty());
    }

    #[test]
    fn package_manager_accepts_original_field_spellings() {
        let pm: PackageManager = serde_json::from_str(
            r#"{
                "DefaultURL": "https://registry.npmjs.org",
                "DefaultConfig": {"online": false},
                "APIEndpoint": {"Path": "/v1/repositories/npm/proxy", "FormatSpecificConfig": {"npm": {}}}
            }"#,
        )
        .unwrap();

        assert_eq!(pm.default_url, "https://registry.npmjs.org");
        assert_eq!(pm.api_endpoint.path, "/v1/repositories/npm/proxy");
        assert!(pm.api_endpoint.format_specific_config.contains_key("npm"));
        assert!(pm.privilege_format.is_none());
    }

    #[test]
    fn invalid_url_is_rejected() {
        let mut settings = ProvisioningSettings::default();
        settings.package_managers.insert(
            "npm".into(),
            PackageManager {
                default_url: "not a url".into(),
                default_config: Default::default(),
                privilege_format: None,
                api_endpoint: ApiEndpoint {
                    path: "/v1/repositories/npm/proxy".into(),
                    format_specific_config: Default::default(),
                },
            },
        );

        let err = settings.validate_package_managers().unwrap_err();
        assert!(err.to_string().contains("npm"));
    }

    #[test]
    fn empty_endpoint_path_is_rejected() {
        let mut settings = ProvisioningSettings::default();
        settings.package_managers.insert(
            "maven".into(),
            PackageManager {
                default_url: "https://repo1.maven.org/maven2/".into(),
                default_config: Default::default(),
                privilege_format: None,
                api_endpoint: ApiEndpoint::default(),
            },
        );

        assert!(settings.validate_package_managers().is_err());
    }
}
