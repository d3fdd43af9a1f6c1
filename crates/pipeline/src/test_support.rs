//! Fixtures shared by the workflow tests.

use provisioner_core::operation::OperationConfig;
use provisioner_core::request::{Action, RepositoryRequest};
use provisioner_core::settings::{ApiEndpoint, PackageManager, ProvisioningSettings};

pub const BASE_ROLE: &str = "nx-base";
pub const EXTRA_ROLE: &str = "nx-extra";
pub const ORG_ID: &str = "org-id-1";

fn package_manager(url: &str, path: &str) -> PackageManager {
    PackageManager {
        default_url: url.into(),
        default_config: Default::default(),
        privilege_format: None,
        api_endpoint: ApiEndpoint {
            path: path.into(),
            format_specific_config: Default::default(),
        },
    }
}

pub fn settings() -> ProvisioningSettings {
    let mut settings = ProvisioningSettings {
        base_roles: vec![BASE_ROLE.into()],
        extra_roles: vec![EXTRA_ROLE.into()],
        ..Default::default()
    };
    settings.organizations.insert("org1".into(), ORG_ID.into());
    settings.organizations.insert("no-id-org".into(), String::new());
    settings.package_managers.insert(
        "npm".into(),
        package_manager("https://registry.npmjs.org", "/v1/repositories/npm/proxy"),
    );
    settings.package_managers.insert(
        "maven".into(),
        package_manager("https://repo1.maven.org/maven2", "/v1/repositories/maven/proxy"),
    );
    settings
}

pub fn request(user: &str, pm: &str, shared: bool, app_id: &str) -> RepositoryRequest {
    RepositoryRequest {
        organization_name: "org1".into(),
        ldap_username: user.into(),
        package_manager: pm.into(),
        shared,
        app_id: app_id.into(),
    }
}

pub fn op(action: Action, user: &str, pm: &str, shared: bool, app_id: &str) -> OperationConfig {
    settings()
        .resolve(&request(user, pm, shared, app_id), action)
        .expect("fixture request resolves")
}
