use provisioner_core::roles::OWNER_ROLE_NAME;

/// Errors from the resource client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("HTTP {status}: {body}")]
    Api {
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("'{OWNER_ROLE_NAME}' role not found in policy server")]
    OwnerRoleNotFound,

    #[error("'{OWNER_ROLE_NAME}' role exists but its id is empty")]
    OwnerRoleMissingId,

    #[error("unsupported package manager format '{0}'")]
    UnsupportedFormat(String),

    #[error("{0} is empty")]
    MissingIdentifier(&'static str),
}

impl ClientError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
