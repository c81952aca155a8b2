use crate::call::Selector;
use crate::claims::ClaimId;
use crate::key_store::{KeyId, KeyType, Purpose};
use serde::{Deserialize, Serialize};
use sovid_crypto::{Address, H256};

/// Observable state changes of an identity, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IdentityEvent {
    KeyAdded {
        key: KeyId,
        purpose: Purpose,
        key_type: KeyType,
    },
    KeyRemoved {
        key: KeyId,
        purpose: Purpose,
        key_type: KeyType,
    },
    ThresholdChanged {
        purpose: Purpose,
        threshold: u32,
    },
    FunctionPermissionSet {
        key: KeyId,
        to: Address,
        selector: Selector,
        allowed: bool,
    },
    ExecutionRequested {
        id: H256,
        to: Address,
        value: u64,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
    Approved {
        id: H256,
        key: KeyId,
        approved: bool,
    },
    Executed {
        id: H256,
        to: Address,
        value: u64,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
    ExecutionFailed {
        id: H256,
        to: Address,
        value: u64,
        reason: String,
    },
    ClaimRequested {
        request_id: H256,
        claim_id: ClaimId,
        topic: u64,
        issuer: Address,
    },
    ClaimAdded {
        claim_id: ClaimId,
        topic: u64,
        issuer: Address,
    },
    ClaimChanged {
        claim_id: ClaimId,
        topic: u64,
        issuer: Address,
    },
    ClaimRemoved {
        claim_id: ClaimId,
        topic: u64,
        issuer: Address,
    },
}
