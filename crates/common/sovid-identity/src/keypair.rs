use crate::claims::NewClaim;
use crate::key_store::{key_of, KeyId};
use sovid_crypto::{recover, Address, DigestVersion, EcdsaSigner, SignerError, H256};

/// secp256k1 keypair bound to an account address and the key id it controls.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub address: Address,
    pub key: KeyId,
    signer: EcdsaSigner,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self::from_signer(EcdsaSigner::generate())
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        EcdsaSigner::from_secret_bytes(bytes).map(Self::from_signer)
    }

    fn from_signer(signer: EcdsaSigner) -> Self {
        let address = signer.address();
        Self {
            address,
            key: key_of(&address),
            signer,
        }
    }

    /// Sign a 32-byte digest, returning a 65-byte recoverable signature.
    pub fn sign_digest(&self, digest: &H256) -> Result<Vec<u8>, SignerError> {
        self.signer.sign_digest(digest)
    }

    /// Whether `signature` over `digest` was made by this keypair.
    pub fn verify(&self, digest: &H256, signature: &[u8]) -> bool {
        recover(digest, signature).map_or(false, |signer| signer == self.address)
    }

    /// Sign a claim about `subject`.
    pub fn sign_claim(&self, subject: &Address, topic: u64, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.sign_digest(&DigestVersion::CURRENT.claim_digest(subject, topic, data))
    }

    /// Sign a delegated execution for `identity` at `nonce`.
    pub fn sign_execution(
        &self,
        identity: &Address,
        to: &Address,
        value: u64,
        data: &[u8],
        nonce: u64,
    ) -> Result<Vec<u8>, SignerError> {
        self.sign_digest(&DigestVersion::CURRENT.execution_digest(identity, to, value, data, nonce))
    }

    /// Sign the outer proxy authorization for adding `claim` to `identity` at `nonce`.
    pub fn sign_proxy_claim(&self, identity: &Address, claim: &NewClaim, nonce: u64) -> Result<Vec<u8>, SignerError> {
        self.sign_digest(&DigestVersion::CURRENT.proxy_claim_digest(
            identity,
            claim.topic,
            claim.scheme.code(),
            &claim.issuer,
            &claim.signature,
            &claim.data,
            &claim.uri,
            nonce,
        ))
    }

    /// Return the bytes of the signing key
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signer.secret_bytes()
    }
}
