use crate::error::{IdentityError, Result};
use crate::host::Host;
use crate::key_store::{key_of, KeyStore, Purpose};
use serde::{Deserialize, Serialize};
use sovid_crypto::{recover, Address, DigestVersion, Packed, H256};
use std::collections::BTreeMap;

/// Identifier of a claim: `keccak256(issuer ‖ topic)`.
pub type ClaimId = H256;

pub fn claim_id(issuer: &Address, topic: u64) -> ClaimId {
    Packed::new().address(issuer).uint(topic).finish()
}

/// Signature scheme of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimScheme {
    Ecdsa = 1,
    Rsa = 2,
    Contract = 3,
}

impl ClaimScheme {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ClaimScheme::Ecdsa),
            2 => Some(ClaimScheme::Rsa),
            3 => Some(ClaimScheme::Contract),
            _ => None,
        }
    }
}

/// A claim as submitted, before it is verified and assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClaim {
    pub topic: u64,
    pub scheme: ClaimScheme,
    pub issuer: Address,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub uri: String,
}

impl NewClaim {
    pub fn id(&self) -> ClaimId {
        claim_id(&self.issuer, self.topic)
    }
}

/// A verified claim held by an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub topic: u64,
    pub scheme: ClaimScheme,
    pub issuer: Address,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub uri: String,
    /// Digest layout the signature was verified against
    pub layout: DigestVersion,
}

impl Claim {
    pub fn is_self_issued(&self, subject: &Address) -> bool {
        self.issuer == *subject
    }

    fn from_new(claim: NewClaim, layout: DigestVersion) -> Self {
        Self {
            id: claim.id(),
            topic: claim.topic,
            scheme: claim.scheme,
            issuer: claim.issuer,
            signature: claim.signature,
            data: claim.data,
            uri: claim.uri,
            layout,
        }
    }
}

/// Check that `signature` over `(subject, topic, data)` comes from an account entitled
/// to speak for `issuer`, returning the recovered signer.
///
/// Self-issued claims need a CLAIM or MANAGEMENT key of `subject`. Claims from another
/// identity need a CLAIM key of that identity. Claims from a plain account must be
/// signed by the account itself.
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_claim_signer(
    subject: &Address,
    keys: &KeyStore,
    host: &dyn Host,
    layout: DigestVersion,
    topic: u64,
    scheme: ClaimScheme,
    issuer: &Address,
    signature: &[u8],
    data: &[u8],
) -> Result<Address> {
    if scheme != ClaimScheme::Ecdsa {
        return Err(IdentityError::UnsupportedScheme(scheme));
    }
    let digest = layout.claim_digest(subject, topic, data);
    let signer = recover(&digest, signature)?;
    let key = key_of(&signer);

    if issuer == subject {
        if keys.key_has_purpose(&key, Purpose::Claim) || keys.key_has_purpose(&key, Purpose::Management) {
            return Ok(signer);
        }
        return Err(IdentityError::SignerMismatch {
            signer,
            reason: "holds neither a claim nor a management key on this identity".to_string(),
        });
    }

    match host.key_has_purpose(issuer, &key, Purpose::Claim) {
        Some(true) => Ok(signer),
        Some(false) => Err(IdentityError::SignerMismatch {
            signer,
            reason: format!("holds no claim key on issuer {}", issuer),
        }),
        None if signer == *issuer => Ok(signer),
        None => Err(IdentityError::SignerMismatch {
            signer,
            reason: format!("is not the issuing account {}", issuer),
        }),
    }
}

/// Verify a submitted claim for `subject` and turn it into a storable [`Claim`].
pub(crate) fn verify_new_claim(subject: &Address, keys: &KeyStore, host: &dyn Host, claim: NewClaim) -> Result<Claim> {
    let layout = DigestVersion::CURRENT;
    verify_claim_signer(
        subject,
        keys,
        host,
        layout,
        claim.topic,
        claim.scheme,
        &claim.issuer,
        &claim.signature,
        &claim.data,
    )?;
    Ok(Claim::from_new(claim, layout))
}

/// Re-run the signer check for a stored claim.
pub(crate) fn reverify_claim(subject: &Address, keys: &KeyStore, host: &dyn Host, claim: &Claim) -> Result<Address> {
    verify_claim_signer(
        subject,
        keys,
        host,
        claim.layout,
        claim.topic,
        claim.scheme,
        &claim.issuer,
        &claim.signature,
        &claim.data,
    )
}

/// Claims held by one identity, indexed by topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimStore {
    claims: BTreeMap<ClaimId, Claim>,
    by_topic: BTreeMap<u64, Vec<ClaimId>>,
}

impl ClaimStore {
    pub fn get_claim(&self, id: &ClaimId) -> Option<&Claim> {
        self.claims.get(id)
    }

    /// Claim ids for `topic`, in the order they were first added.
    pub fn get_claim_ids_by_topic(&self, topic: u64) -> &[ClaimId] {
        self.by_topic.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_claims(&self) -> usize {
        self.claims.len()
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    /// Insert or replace the claim for its `(issuer, topic)`. Returns `true` when new.
    pub(crate) fn upsert(&mut self, claim: Claim) -> bool {
        let id = claim.id;
        let topic = claim.topic;
        let is_new = self.claims.insert(id, claim).is_none();
        if is_new {
            self.by_topic.entry(topic).or_default().push(id);
        }
        is_new
    }

    pub(crate) fn remove(&mut self, id: &ClaimId) -> Option<Claim> {
        let claim = self.claims.remove(id)?;
        if let Some(ids) = self.by_topic.get_mut(&claim.topic) {
            ids.retain(|c| c != id);
            if ids.is_empty() {
                self.by_topic.remove(&claim.topic);
            }
        }
        Some(claim)
    }
}
