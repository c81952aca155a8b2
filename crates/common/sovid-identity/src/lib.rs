//! Sovid Identity – purpose-scoped keys, multi-signature execution and claims.
//!
//! - Keys are `keccak256(address)` ids tagged with purposes (MANAGEMENT, ACTION, CLAIM, ...).
//! - Calls to the identity itself need MANAGEMENT approval, calls elsewhere need ACTION;
//!   thresholds above one turn a call into a request that collects approvals.
//! - Delegated execution through a detached MANAGEMENT-key signature and a replay nonce.
//! - Claims signed by the identity's own keys, by another identity's CLAIM keys, or by a
//!   plain account, with revalidation when signers lose their purpose.
//! - Zero `unsafe`; `#![forbid(unsafe_code)]`.

#![forbid(unsafe_code)]

pub mod call;
mod claims;
mod error;
mod events;
mod execution;
mod host;
mod identity;
mod key_store;
mod keypair;

pub use call::{selector_for, selector_of, IdentityCall, Selector};
pub use claims::{claim_id, Claim, ClaimId, ClaimScheme, ClaimStore, NewClaim};
pub use error::{IdentityError, Result};
pub use events::IdentityEvent;
pub use execution::{Execution, ExecutionClass, ExecutionEngine, ExecutionRequest, ExecutionStatus};
pub use host::{Host, SubcallError};
pub use identity::{ClaimOutcome, GenesisConfig, Identity};
pub use key_store::{key_of, Key, KeyId, KeyStore, KeyType, Purpose, Thresholds};
pub use keypair::KeyPair;
pub use sovid_crypto::{Address, DigestVersion, H256};
