//! Well-known role, status, and naming constants shared by the
//! provisioning workflows.

/// Role granted for non-project-specific shared repository access.
pub const SHARED_ROLE: &str = "repositories.share";

/// Name of the elevated organization role in the policy server.
pub const OWNER_ROLE_NAME: &str = "Owner";

/// Repository name suffix used instead of an app id for shared repositories.
pub const SHARED_SUFFIX: &str = "shared";

/// Infix between the package manager and the app id in repository names.
pub const RELEASE_INFIX: &str = "-release-";

/// User status written by the offboarding flow.
pub const USER_STATUS_DISABLED: &str = "disabled";
