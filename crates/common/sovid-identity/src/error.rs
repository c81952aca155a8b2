use crate::claims::ClaimScheme;
use crate::key_store::KeyId;
use sovid_crypto::{Address, RecoverError, H256};
use thiserror::Error;

/// Errors returned by identity operations.
///
/// Every operation validates before it mutates, so an error always means no state changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] RecoverError),

    #[error("signer {signer} is not authorized: {reason}")]
    SignerMismatch { signer: Address, reason: String },

    #[error("replay rejected: {0}")]
    ReplayRejected(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("unknown execution request {0}")]
    UnknownRequest(H256),

    #[error("unknown key {0}")]
    UnknownKey(KeyId),

    #[error("claim scheme {0:?} cannot be verified")]
    UnsupportedScheme(ClaimScheme),

    #[error("malformed call data: {0}")]
    MalformedCall(String),
}

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;
