use provisioner_clients::ClientError;
use provisioner_core::error::CoreError;

/// Why a single request's workflow failed.
///
/// The `Display` text is what callers see as the request's failure reason.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// The request could not be resolved against the static settings.
    #[error(transparent)]
    Config(#[from] CoreError),

    /// An upstream call failed; `context` names the step.
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: ClientError,
    },

    #[error("user '{0}' not found")]
    UserNotFound(String),
}

impl OperationError {
    /// Adapter for `map_err` that attaches a step description.
    pub fn upstream(context: impl Into<String>) -> impl FnOnce(ClientError) -> Self {
        let context = context.into();
        move |source| Self::Upstream { context, source }
    }
}
