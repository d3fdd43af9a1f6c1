//! Provisioning workflows and the batch orchestrator.
//!
//! Each valid request in a batch runs either the [`creation`] or the
//! [`deletion`] workflow against the resource clients, followed by the
//! organization-role step. The [`batch`] module fans requests out, gathers
//! their results and records the outcome on the job.

pub mod batch;
pub mod creation;
pub mod deletion;
pub mod error;
pub mod locks;
pub mod org_cleanup;
pub mod progress;
pub mod summary;

#[cfg(test)]
mod test_support;

pub use batch::{BatchManager, BatchTicket};
pub use error::OperationError;
pub use locks::{KeyedLocks, ResourceLocks};
pub use summary::{OperationMode, OperationSummary};
