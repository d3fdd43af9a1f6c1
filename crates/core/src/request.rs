//! Inbound request types for batch provisioning.
//!
//! Field names serialize as camelCase. The original PascalCase and `ID`
//! spellings are accepted as aliases on input so older clients keep working.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// The two batch operations the service supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One desired create/delete operation as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRequest {
    /// Organization name in the policy server; resolved to an id at run time.
    #[serde(alias = "OrganizationName")]
    #[validate(length(min = 1, message = "organizationName is required"))]
    pub organization_name: String,

    /// LDAP user who receives (or loses) access.
    #[serde(alias = "LdapUsername")]
    #[validate(length(min = 1, message = "ldapUsername is required"))]
    pub ldap_username: String,

    /// Repository format, e.g. `npm` or `maven`. Empty for offboarding deletes.
    #[serde(default, alias = "PackageManager")]
    pub package_manager: String,

    #[serde(default, alias = "Shared")]
    pub shared: bool,

    #[serde(default, alias = "AppID", alias = "appID")]
    pub app_id: String,
}

/// Request body for `POST /repositories` and `DELETE /repositories`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(alias = "Requests")]
    #[validate(nested)]
    pub requests: Vec<RepositoryRequest>,
}

/// A request that failed during background processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRequest {
    pub request: RepositoryRequest,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_body() {
        let body: BatchRequest = serde_json::from_str(
            r#"{"requests":[{"organizationName":"org","ldapUsername":"alice","packageManager":"npm","appId":"app-1"}]}"#,
        )
        .unwrap();

        let req = &body.requests[0];
        assert_eq!(req.organization_name, "org");
        assert_eq!(req.package_manager, "npm");
        assert_eq!(req.app_id, "app-1");
        assert!(!req.shared);
    }

    #[test]
    fn accepts_pascal_case_aliases() {
        let body: BatchRequest = serde_json::from_str(
            r#"{"Requests":[{"OrganizationName":"org","LdapUsername":"bob","Shared":true,"AppID":"app-9"}]}"#,
        )
        .unwrap();

        let req = &body.requests[0];
        assert_eq!(req.ldap_username, "bob");
        assert!(req.shared);
        assert_eq!(req.app_id, "app-9");
        assert!(req.package_manager.is_empty());
    }

    #[test]
    fn empty_username_fails_validation() {
        let body = BatchRequest {
            requests: vec![RepositoryRequest {
                organization_name: "org".into(),
                ldap_username: String::new(),
                package_manager: "npm".into(),
                shared: false,
                app_id: "a".into(),
            }],
        };

        assert!(body.validate().is_err());
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Action::Delete).unwrap(), "delete");
        assert_eq!(Action::Create.to_string(), "create");
    }
}
