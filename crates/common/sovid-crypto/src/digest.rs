//! Keccak-256 hashing and the packed digest layouts signed by identity keys.

use crate::{Address, H256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Prefix applied to a 32-byte digest before it is signed.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Keccak-256 of `bytes`.
pub fn keccak256(bytes: &[u8]) -> H256 {
    H256(Keccak256::digest(bytes).into())
}

/// `keccak256(prefix ‖ digest)`, the hash actually covered by a signature.
pub fn signed_message_hash(digest: &H256) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX);
    hasher.update(digest.0);
    H256(hasher.finalize().into())
}

/// Packed big-endian pre-image builder.
///
/// Addresses contribute 20 bytes, integers a 32-byte word, byte strings their raw contents.
#[derive(Debug, Default, Clone)]
pub struct Packed(Vec<u8>);

impl Packed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.0.extend_from_slice(address.as_bytes());
        self
    }

    pub fn uint(mut self, value: u64) -> Self {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        self.0.extend_from_slice(&word);
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn finish(self) -> H256 {
        keccak256(&self.0)
    }
}

/// Version tag for the digest layouts.
///
/// Signed payloads never change shape silently: a new layout gets a new variant
/// and stored claims remember the version they were verified with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestVersion {
    #[default]
    V1,
}

impl DigestVersion {
    pub const CURRENT: DigestVersion = DigestVersion::V1;

    /// `keccak256(subject ‖ topic ‖ data)`
    pub fn claim_digest(self, subject: &Address, topic: u64, data: &[u8]) -> H256 {
        match self {
            DigestVersion::V1 => Packed::new().address(subject).uint(topic).bytes(data).finish(),
        }
    }

    /// `keccak256(identity ‖ to ‖ value ‖ data ‖ nonce)`, shared by execution ids and
    /// delegated execution signatures.
    pub fn execution_digest(
        self,
        identity: &Address,
        to: &Address,
        value: u64,
        data: &[u8],
        nonce: u64,
    ) -> H256 {
        match self {
            DigestVersion::V1 => Packed::new()
                .address(identity)
                .address(to)
                .uint(value)
                .bytes(data)
                .uint(nonce)
                .finish(),
        }
    }

    /// `keccak256(identity ‖ topic ‖ scheme ‖ issuer ‖ signature ‖ data ‖ uri ‖ nonce)`
    #[allow(clippy::too_many_arguments)]
    pub fn proxy_claim_digest(
        self,
        identity: &Address,
        topic: u64,
        scheme: u8,
        issuer: &Address,
        signature: &[u8],
        data: &[u8],
        uri: &str,
        nonce: u64,
    ) -> H256 {
        match self {
            DigestVersion::V1 => Packed::new()
                .address(identity)
                .uint(topic)
                .uint(u64::from(scheme))
                .address(issuer)
                .bytes(signature)
                .bytes(data)
                .bytes(uri.as_bytes())
                .uint(nonce)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            keccak256(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn packed_layout_widths() {
        let packed = Packed::new()
            .address(&Address([1; 20]))
            .uint(7)
            .bytes(b"abc");
        let bytes = packed.as_slice();
        assert_eq!(bytes.len(), 20 + 32 + 3);
        assert_eq!(bytes[20 + 31], 7);
        assert!(bytes[20..20 + 31].iter().all(|b| *b == 0));
        assert_eq!(&bytes[52..], b"abc");
    }

    #[test]
    fn claim_digest_binds_every_field() {
        let subject = Address([1; 20]);
        let base = DigestVersion::V1.claim_digest(&subject, 1, b"data");
        assert_ne!(base, DigestVersion::V1.claim_digest(&Address([2; 20]), 1, b"data"));
        assert_ne!(base, DigestVersion::V1.claim_digest(&subject, 2, b"data"));
        assert_ne!(base, DigestVersion::V1.claim_digest(&subject, 1, b"other"));
    }

    #[test]
    fn execution_digest_depends_on_nonce() {
        let id = Address([1; 20]);
        let to = Address([2; 20]);
        let a = DigestVersion::V1.execution_digest(&id, &to, 0, b"", 0);
        let b = DigestVersion::V1.execution_digest(&id, &to, 0, b"", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn proxy_claim_digest_depends_on_nonce() {
        let id = Address([1; 20]);
        let issuer = Address([2; 20]);
        let a = DigestVersion::V1.proxy_claim_digest(&id, 3, 1, &issuer, b"sig", b"data", "uri", 0);
        let b = DigestVersion::V1.proxy_claim_digest(&id, 3, 1, &issuer, b"sig", b"data", "uri", 1);
        assert_ne!(a, b);
    }
}
