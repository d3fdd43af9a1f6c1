//! Domain model and pure decision logic for repository provisioning.
//!
//! Nothing in this crate performs network I/O: it resolves requests into
//! operation descriptors, validates batches, decides role membership, and
//! tracks batch jobs in memory.

pub mod error;
pub mod job;
pub mod operation;
pub mod request;
pub mod role_engine;
pub mod roles;
pub mod settings;
pub mod types;
pub mod validation;
