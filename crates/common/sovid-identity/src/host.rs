use crate::key_store::{KeyId, Purpose};
use sovid_crypto::Address;
use thiserror::Error;

/// Why a call through the host did not complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubcallError {
    #[error("call to {target} reverted: {reason}")]
    Reverted { target: Address, reason: String },

    #[error("reentrant call into {0}, which is already executing")]
    Reentrant(Address),

    #[error("call depth limit of {0} exceeded")]
    DepthExceeded(usize),
}

/// The environment an identity executes in.
pub trait Host {
    /// Perform a call from `sender` to `to`. A plain account accepts any call and
    /// returns no output.
    fn call(&mut self, sender: Address, to: Address, value: u64, data: &[u8]) -> Result<Vec<u8>, SubcallError>;

    /// Ask another identity whether `key` holds `purpose` there. `None` when
    /// `identity` is not an identity.
    fn key_has_purpose(&self, identity: &Address, key: &KeyId, purpose: Purpose) -> Option<bool>;
}
