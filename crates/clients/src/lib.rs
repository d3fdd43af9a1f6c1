//! REST clients for the repository manager and the policy server.
//!
//! Each service is exposed as a capability trait ([`nexus::NexusClient`],
//! [`iq::IqClient`]) so the provisioning workflows can run against either
//! the real [`reqwest`]-backed implementation or an in-memory fake.

pub mod error;
pub mod http;
pub mod iq;
pub mod models;
pub mod nexus;

#[cfg(feature = "testing")]
pub mod testing;

pub use error::ClientError;
pub use iq::{IqClient, IqServerApi};
pub use nexus::{NexusApi, NexusClient};
