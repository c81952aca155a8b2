use crate::call::{selector_for, selector_of, Selector, ADD_KEY};
use crate::key_store::{KeyId, KeyStore, Purpose};
use serde::{Deserialize, Serialize};
use sovid_crypto::{Address, H256};
use std::collections::{BTreeMap, BTreeSet};

/// Which threshold governs a call: calls to the identity itself are management calls,
/// everything else is an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionClass {
    Management,
    Action,
}

impl ExecutionClass {
    pub fn of(identity: &Address, to: &Address) -> Self {
        if identity == to {
            ExecutionClass::Management
        } else {
            ExecutionClass::Action
        }
    }

    pub fn purpose(self) -> Purpose {
        match self {
            ExecutionClass::Management => Purpose::Management,
            ExecutionClass::Action => Purpose::Action,
        }
    }

    pub fn threshold(self, keys: &KeyStore) -> u32 {
        keys.threshold_for(self.purpose())
    }
}

/// Lifecycle of a stored request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Pending,
    Executed,
    /// Ran once and the call failed; the request is spent all the same
    Failed { reason: String },
}

/// A call waiting for approvals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub id: H256,
    pub to: Address,
    pub value: u64,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub nonce: u64,
    pub class: ExecutionClass,
    /// Approvals needed, frozen when the request was created
    pub required: u32,
    pub approvals: BTreeMap<KeyId, bool>,
    pub status: ExecutionStatus,
}

impl ExecutionRequest {
    pub fn approval_count(&self) -> usize {
        self.approvals.values().filter(|approved| **approved).count()
    }

    pub fn has_approved(&self, key: &KeyId) -> bool {
        self.approvals.get(key).copied().unwrap_or(false)
    }

    pub fn is_executed(&self) -> bool {
        !matches!(self.status, ExecutionStatus::Pending)
    }

    pub fn selector(&self) -> Option<Selector> {
        selector_of(&self.data)
    }
}

/// What an execute/approve call resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// Stored, waiting for more approvals
    Pending { id: H256 },
    Executed { id: H256, output: Vec<u8> },
    /// The call ran and failed. Bookkeeping is kept; the call's own effects are void.
    Failed { id: H256, reason: String },
}

impl Execution {
    pub fn id(&self) -> H256 {
        match self {
            Execution::Pending { id } | Execution::Executed { id, .. } | Execution::Failed { id, .. } => *id,
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Execution::Executed { .. })
    }
}

/// Pending requests, the replay counter and the CUSTOM allow-list of one identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionEngine {
    requests: BTreeMap<H256, ExecutionRequest>,
    nonce: u64,
    allowed: BTreeSet<(KeyId, Address, Selector)>,
}

impl ExecutionEngine {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_execution(&self, id: &H256) -> Option<&ExecutionRequest> {
        self.requests.get(id)
    }

    pub fn executions(&self) -> impl Iterator<Item = &ExecutionRequest> {
        self.requests.values()
    }

    pub fn pending_executions(&self) -> impl Iterator<Item = &ExecutionRequest> {
        self.requests.values().filter(|r| !r.is_executed())
    }

    pub fn is_allowed(&self, key: &KeyId, to: &Address, selector: &Selector) -> bool {
        self.allowed.contains(&(*key, *to, *selector))
    }

    /// Whether `key` may authorize a call to `to` with `selector` on `identity`.
    ///
    /// The key must hold the purpose of the call's class, or be a RESTORE key adding a
    /// key, or be a CUSTOM key with an allow-list entry for exactly `(to, selector)`.
    pub fn key_can_execute(
        &self,
        keys: &KeyStore,
        identity: &Address,
        key: &KeyId,
        to: &Address,
        selector: Option<Selector>,
    ) -> bool {
        let class = ExecutionClass::of(identity, to);
        if keys.key_has_purpose(key, class.purpose()) {
            return true;
        }
        let Some(selector) = selector else {
            return false;
        };
        if class == ExecutionClass::Management
            && selector == selector_for(ADD_KEY)
            && keys.key_has_purpose(key, Purpose::Restore)
        {
            return true;
        }
        keys.key_has_purpose(key, Purpose::Custom) && self.is_allowed(key, to, &selector)
    }

    /// Consume the current nonce.
    pub(crate) fn next_nonce(&mut self) -> u64 {
        let nonce = self.nonce;
        self.nonce += 1;
        nonce
    }

    pub(crate) fn set_allowed(&mut self, key: KeyId, to: Address, selector: Selector, allowed: bool) {
        if allowed {
            self.allowed.insert((key, to, selector));
        } else {
            self.allowed.remove(&(key, to, selector));
        }
    }

    /// Drop every allow-list entry of `key`, returning how many were removed.
    pub(crate) fn revoke_allowed(&mut self, key: &KeyId) -> usize {
        let before = self.allowed.len();
        self.allowed.retain(|(k, _, _)| k != key);
        before - self.allowed.len()
    }

    pub(crate) fn open(&mut self, request: ExecutionRequest) {
        self.requests.insert(request.id, request);
    }

    pub(crate) fn request_mut(&mut self, id: &H256) -> Option<&mut ExecutionRequest> {
        self.requests.get_mut(id)
    }
}
