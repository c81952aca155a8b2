use crate::digest::{keccak256, signed_message_hash};
use crate::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// Length of an `r ‖ s ‖ v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Error types for signer recovery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoverError {
    #[error("invalid signature length: expected {expected_len} bytes, found {found_len} bytes")]
    InvalidSignatureLength { expected_len: usize, found_len: usize },

    #[error("invalid recovery byte {0}: expected 0, 1, 27 or 28")]
    InvalidRecoveryId(u8),

    #[error("signature scalars are zero or out of range")]
    MalformedScalars,

    #[error("no public key is recoverable from the signature")]
    Unrecoverable,
}

/// Error types for signing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Recover the address that signed `digest`.
///
/// The signature covers the signed-message hash of the digest, not the digest itself.
/// High-S signatures are rejected as unrecoverable.
pub fn recover(digest: &H256, signature: &[u8]) -> Result<Address, RecoverError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(RecoverError::InvalidSignatureLength {
            expected_len: SIGNATURE_LENGTH,
            found_len: signature.len(),
        });
    }

    let v = signature[64];
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => return Err(RecoverError::InvalidRecoveryId(other)),
    };
    let recovery_id = RecoveryId::from_byte(normalized).ok_or(RecoverError::InvalidRecoveryId(v))?;
    let sig = Signature::from_slice(&signature[..64]).map_err(|_| RecoverError::MalformedScalars)?;

    let prehash = signed_message_hash(digest);
    let key = VerifyingKey::recover_from_prehash(prehash.as_bytes(), &sig, recovery_id)
        .map_err(|_| RecoverError::Unrecoverable)?;
    Ok(address_of(&key))
}

/// Account address of a secp256k1 public key: the low 20 bytes of the keccak-256 of
/// its uncompressed encoding.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    Address::from_word(&keccak256(&point.as_bytes()[1..]))
}

/// A secp256k1 signing key with its derived account address.
#[derive(Clone)]
pub struct EcdsaSigner {
    key: SigningKey,
    address: Address,
}

impl EcdsaSigner {
    /// Generate a fresh signing key from the OS random source.
    pub fn generate() -> Self {
        Self::from_key(SigningKey::random(&mut OsRng))
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(bytes).map_err(|e| SignerError::InvalidSecretKey(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.key.to_bytes().into()
    }

    /// Sign the signed-message hash of `digest`, returning `r ‖ s ‖ v` with `v ∈ {27, 28}`.
    pub fn sign_digest(&self, digest: &H256) -> Result<Vec<u8>, SignerError> {
        let prehash = signed_message_hash(digest);
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(prehash.as_bytes())
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut out = Vec::with_capacity(SIGNATURE_LENGTH);
        out.extend_from_slice(&sig.to_bytes());
        out.push(recovery_id.to_byte() + 27);
        Ok(out)
    }
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner").field("address", &self.address).finish_non_exhaustive()
    }
}
