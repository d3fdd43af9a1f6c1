use std::sync::Arc;

use provisioner_core::job::JobStore;
use provisioner_pipeline::BatchManager;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Batch orchestrator. Owns the job store and the upstream clients.
    pub batches: BatchManager,
}

impl AppState {
    pub fn jobs(&self) -> &Arc<JobStore> {
        self.batches.jobs()
    }
}
