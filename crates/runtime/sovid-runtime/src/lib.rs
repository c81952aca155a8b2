//! Reference host for sovid identities: an in-memory network of identities and
//! contracts, TOML configuration and sled persistence.

pub mod config;
mod network;
pub mod sled_storage;

pub use config::RuntimeConfig;
pub use network::{Contract, Network, NetworkError, Result};
pub use sled_storage::SledStore;
