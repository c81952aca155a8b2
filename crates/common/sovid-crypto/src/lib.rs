//! Signature verification primitives for sovid identities.
//!
//! Provides keccak-256 hashing, versioned digest layouts and recovery of the
//! signing account from a 65-byte secp256k1 signature.

#![forbid(unsafe_code)]

pub mod digest;
pub mod ecdsa;
mod primitives;

pub use digest::{keccak256, signed_message_hash, DigestVersion, Packed};
pub use ecdsa::{address_of, recover, EcdsaSigner, RecoverError, SignerError, SIGNATURE_LENGTH};
pub use primitives::{Address, BytesError, H256};
