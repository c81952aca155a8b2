use crate::call::{selector_for, selector_of, IdentityCall, Selector, ADD_CLAIM};
use crate::claims::{reverify_claim, verify_new_claim, Claim, ClaimId, ClaimStore, NewClaim};
use crate::error::{IdentityError, Result};
use crate::events::IdentityEvent;
use crate::execution::{Execution, ExecutionClass, ExecutionEngine, ExecutionRequest, ExecutionStatus};
use crate::host::Host;
use crate::key_store::{key_of, Key, KeyId, KeyStore, KeyType, Purpose, Thresholds};
use serde::{Deserialize, Serialize};
use sovid_crypto::{recover, Address, DigestVersion, Packed, H256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Initial state of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Account deploying the identity
    pub creator: Address,
    pub salt: u64,
    /// Initial `(key, purpose)` grants. When empty the creator gets MANAGEMENT, ACTION
    /// and CLAIM.
    pub keys: Vec<(KeyId, Purpose)>,
    pub thresholds: Thresholds,
    pub claims: Vec<NewClaim>,
}

impl GenesisConfig {
    pub fn new(creator: Address, salt: u64) -> Self {
        Self {
            creator,
            salt,
            keys: Vec::new(),
            thresholds: Thresholds::default(),
            claims: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: KeyId, purpose: Purpose) -> Self {
        self.keys.push((key, purpose));
        self
    }

    pub fn with_thresholds(mut self, management: u32, action: u32) -> Self {
        self.thresholds = Thresholds { management, action };
        self
    }

    pub fn with_claim(mut self, claim: NewClaim) -> Self {
        self.claims.push(claim);
        self
    }

    /// Address the identity will live at.
    pub fn address(&self) -> Address {
        Identity::derive_address(&self.creator, self.salt)
    }
}

/// Result of submitting a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Added(ClaimId),
    Updated(ClaimId),
    /// Staged as a claim request awaiting management approval
    Requested { request_id: H256, claim_id: ClaimId },
}

impl ClaimOutcome {
    pub fn claim_id(&self) -> ClaimId {
        match self {
            ClaimOutcome::Added(id) | ClaimOutcome::Updated(id) => *id,
            ClaimOutcome::Requested { claim_id, .. } => *claim_id,
        }
    }
}

/// A self-sovereign identity: purpose-scoped keys, an execution engine and claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    address: Address,
    keys: KeyStore,
    claims: ClaimStore,
    engine: ExecutionEngine,
    #[serde(skip)]
    events: Vec<IdentityEvent>,
}

impl Identity {
    /// `keccak256(creator ‖ salt)[12..]`
    pub fn derive_address(creator: &Address, salt: u64) -> Address {
        Address::from_word(&Packed::new().address(creator).uint(salt).finish())
    }

    /// Create an identity from its genesis configuration.
    ///
    /// Initial claims are verified like [`Identity::add_claim`] and applied directly.
    pub fn genesis(config: GenesisConfig, host: &dyn Host) -> Result<Self> {
        let address = config.address();
        let mut identity = Self {
            address,
            keys: KeyStore::default(),
            claims: ClaimStore::default(),
            engine: ExecutionEngine::default(),
            events: Vec::new(),
        };

        let grants = if config.keys.is_empty() {
            let key = key_of(&config.creator);
            vec![(key, Purpose::Management), (key, Purpose::Action), (key, Purpose::Claim)]
        } else {
            config.keys
        };
        for (key, purpose) in grants {
            identity.apply_add_key(key, purpose, KeyType::Ecdsa);
        }
        identity.keys.init_thresholds(config.thresholds)?;

        for claim in config.claims {
            let verified = verify_new_claim(&identity.address, &identity.keys, host, claim)?;
            identity.store_claim(verified);
        }

        info!(
            identity = %address,
            keys = identity.keys.num_keys(),
            claims = identity.claims.num_claims(),
            "identity created"
        );
        Ok(identity)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn claims(&self) -> &ClaimStore {
        &self.claims
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn key_has_purpose(&self, key: &KeyId, purpose: Purpose) -> bool {
        self.keys.key_has_purpose(key, purpose)
    }

    pub fn get_key(&self, key: &KeyId) -> Option<&Key> {
        self.keys.get_key(key)
    }

    pub fn get_keys_by_purpose(&self, purpose: Purpose) -> &[KeyId] {
        self.keys.get_keys_by_purpose(purpose)
    }

    pub fn num_keys(&self) -> usize {
        self.keys.num_keys()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.keys.thresholds()
    }

    pub fn get_claim(&self, id: &ClaimId) -> Option<&Claim> {
        self.claims.get_claim(id)
    }

    pub fn get_claim_ids_by_topic(&self, topic: u64) -> &[ClaimId] {
        self.claims.get_claim_ids_by_topic(topic)
    }

    pub fn num_claims(&self) -> usize {
        self.claims.num_claims()
    }

    pub fn nonce(&self) -> u64 {
        self.engine.nonce()
    }

    pub fn get_execution(&self, id: &H256) -> Option<&ExecutionRequest> {
        self.engine.get_execution(id)
    }

    pub fn key_can_execute(&self, key: &KeyId, to: &Address, selector: Option<Selector>) -> bool {
        self.engine.key_can_execute(&self.keys, &self.address, key, to, selector)
    }

    pub fn events(&self) -> &[IdentityEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<IdentityEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn add_key(&mut self, caller: Address, key: KeyId, purpose: Purpose, key_type: KeyType) -> Result<()> {
        self.authorize_direct(&caller, &IdentityCall::AddKey { key, purpose, key_type })?;
        self.apply_add_key(key, purpose, key_type);
        Ok(())
    }

    pub fn remove_key(&mut self, caller: Address, key: KeyId, purpose: Purpose) -> Result<()> {
        self.authorize_direct(&caller, &IdentityCall::RemoveKey { key, purpose })?;
        self.apply_remove_key(key, purpose)
    }

    pub fn change_management_threshold(&mut self, caller: Address, threshold: u32) -> Result<()> {
        self.authorize_direct(&caller, &IdentityCall::ChangeManagementThreshold { threshold })?;
        self.apply_threshold(Purpose::Management, threshold)
    }

    pub fn change_action_threshold(&mut self, caller: Address, threshold: u32) -> Result<()> {
        self.authorize_direct(&caller, &IdentityCall::ChangeActionThreshold { threshold })?;
        self.apply_threshold(Purpose::Action, threshold)
    }

    /// Grant or revoke the CUSTOM allow-list entry `(key, to, selector)`.
    pub fn set_func(&mut self, caller: Address, key: KeyId, to: Address, selector: Selector, allowed: bool) -> Result<()> {
        self.authorize_direct(&caller, &IdentityCall::SetFunc { key, to, selector, allowed })?;
        self.apply_set_func(key, to, selector, allowed)
    }

    /// Execute `(to, value, data)` on behalf of `caller`.
    ///
    /// Runs immediately when the class threshold is one, otherwise stores a request
    /// carrying the caller's approval.
    pub fn execute(
        &mut self,
        caller: Address,
        to: Address,
        value: u64,
        data: Vec<u8>,
        host: &mut dyn Host,
    ) -> Result<Execution> {
        let key = key_of(&caller);
        if !self.key_can_execute(&key, &to, selector_of(&data)) {
            return Err(IdentityError::AuthorizationDenied(format!(
                "{} may not execute calls to {}",
                caller, to
            )));
        }

        let class = ExecutionClass::of(&self.address, &to);
        let required = class.threshold(&self.keys);
        let nonce = self.engine.next_nonce();
        let id = DigestVersion::CURRENT.execution_digest(&self.address, &to, value, &data, nonce);
        debug!(identity = %self.address, %id, %to, nonce, required, "execution requested");

        if required <= 1 {
            return Ok(self.run(id, to, value, data, host));
        }

        self.emit(IdentityEvent::ExecutionRequested {
            id,
            to,
            value,
            data: data.clone(),
        });
        let mut approvals = BTreeMap::new();
        approvals.insert(key, true);
        self.engine.open(ExecutionRequest {
            id,
            to,
            value,
            data,
            nonce,
            class,
            required,
            approvals,
            status: ExecutionStatus::Pending,
        });
        self.emit(IdentityEvent::Approved {
            id,
            key,
            approved: true,
        });
        Ok(Execution::Pending { id })
    }

    /// Record `caller`'s approval (or withdraw it) for request `id`, running the call
    /// once enough approvals are in.
    pub fn approve(&mut self, caller: Address, id: H256, approve: bool, host: &mut dyn Host) -> Result<Execution> {
        let key = key_of(&caller);
        let request = self.engine.get_execution(&id).ok_or(IdentityError::UnknownRequest(id))?;
        if request.is_executed() {
            return Err(IdentityError::ReplayRejected(format!("request {} was already executed", id)));
        }
        if !self.key_can_execute(&key, &request.to, request.selector()) {
            return Err(IdentityError::AuthorizationDenied(format!(
                "{} may not approve calls to {}",
                caller, request.to
            )));
        }
        if approve && request.has_approved(&key) {
            return Err(IdentityError::ReplayRejected(format!("{} already approved {}", caller, id)));
        }

        let request = self.engine.request_mut(&id).ok_or(IdentityError::UnknownRequest(id))?;
        if approve {
            request.approvals.insert(key, true);
        } else {
            request.approvals.remove(&key);
        }
        let ready = approve && request.approval_count() >= request.required as usize;
        let call = ready.then(|| {
            request.status = ExecutionStatus::Executed;
            (request.to, request.value, request.data.clone())
        });

        self.emit(IdentityEvent::Approved {
            id,
            key,
            approved: approve,
        });

        let Some((to, value, data)) = call else {
            return Ok(Execution::Pending { id });
        };
        let outcome = self.run(id, to, value, data, host);
        if let Execution::Failed { reason, .. } = &outcome {
            if let Some(request) = self.engine.request_mut(&id) {
                request.status = ExecutionStatus::Failed { reason: reason.clone() };
            }
        }
        Ok(outcome)
    }

    /// Execute a call authorized by a detached MANAGEMENT-key signature over
    /// `(identity, to, value, data, nonce)`.
    pub fn delegated_execute(
        &mut self,
        to: Address,
        value: u64,
        data: Vec<u8>,
        nonce: u64,
        signature: &[u8],
        host: &mut dyn Host,
    ) -> Result<Execution> {
        let expected = self.engine.nonce();
        if nonce != expected {
            return Err(IdentityError::ReplayRejected(format!(
                "nonce {} does not match current nonce {}",
                nonce, expected
            )));
        }

        let digest = DigestVersion::CURRENT.execution_digest(&self.address, &to, value, &data, nonce);
        let signer = recover(&digest, signature)?;
        if !self.keys.key_has_purpose(&key_of(&signer), Purpose::Management) {
            return Err(IdentityError::SignerMismatch {
                signer,
                reason: "holds no management key".to_string(),
            });
        }
        let class = ExecutionClass::of(&self.address, &to);
        if class.threshold(&self.keys) > 1 {
            return Err(IdentityError::AuthorizationDenied(format!(
                "delegated execution needs a {:?} threshold of one",
                class
            )));
        }

        self.engine.next_nonce();
        debug!(identity = %self.address, %signer, nonce, "delegated execution");
        Ok(self.run(digest, to, value, data, host))
    }

    fn run(&mut self, id: H256, to: Address, value: u64, data: Vec<u8>, host: &mut dyn Host) -> Execution {
        let result = if to == self.address {
            IdentityCall::decode(&data)
                .and_then(|call| self.apply(call, host))
                .map_err(|e| e.to_string())
        } else {
            host.call(self.address, to, value, &data).map_err(|e| e.to_string())
        };

        match result {
            Ok(output) => {
                info!(identity = %self.address, %id, %to, "executed");
                self.emit(IdentityEvent::Executed { id, to, value, data });
                Execution::Executed { id, output }
            }
            Err(reason) => {
                warn!(identity = %self.address, %id, %to, %reason, "execution failed");
                self.emit(IdentityEvent::ExecutionFailed {
                    id,
                    to,
                    value,
                    reason: reason.clone(),
                });
                Execution::Failed { id, reason }
            }
        }
    }

    /// Add or update a claim.
    ///
    /// Applied at once when `caller` is the identity itself or a MANAGEMENT/CLAIM key
    /// while the management threshold is one; staged as a claim request otherwise.
    pub fn add_claim(&mut self, caller: Address, claim: NewClaim, host: &mut dyn Host) -> Result<ClaimOutcome> {
        let direct = self
            .authorize(&caller, &[Purpose::Management, Purpose::Claim], selector_for(ADD_CLAIM), ADD_CLAIM)
            .is_ok();
        if direct {
            let verified = verify_new_claim(&self.address, &self.keys, &*host, claim)?;
            return Ok(self.store_claim(verified));
        }

        verify_new_claim(&self.address, &self.keys, &*host, claim.clone())?;
        let key = key_of(&caller);
        let approver = self
            .key_can_execute(&key, &self.address, Some(selector_for(ADD_CLAIM)))
            .then_some(key);
        self.stage_claim(claim, approver)
    }

    /// Add a claim authorized by a MANAGEMENT-key signature over the proxy digest at the
    /// current `nonce`. Anyone may submit it; the nonce is consumed on success.
    pub fn add_claim_by_proxy(
        &mut self,
        submitter: Address,
        claim: NewClaim,
        nonce: u64,
        proxy_signature: &[u8],
        host: &mut dyn Host,
    ) -> Result<ClaimOutcome> {
        let expected = self.engine.nonce();
        if nonce != expected {
            return Err(IdentityError::ReplayRejected(format!(
                "nonce {} does not match current nonce {}",
                nonce, expected
            )));
        }

        let digest = DigestVersion::CURRENT.proxy_claim_digest(
            &self.address,
            claim.topic,
            claim.scheme.code(),
            &claim.issuer,
            &claim.signature,
            &claim.data,
            &claim.uri,
            nonce,
        );
        let signer = recover(&digest, proxy_signature)?;
        let key = key_of(&signer);
        if !self.keys.key_has_purpose(&key, Purpose::Management) {
            return Err(IdentityError::SignerMismatch {
                signer,
                reason: "holds no management key".to_string(),
            });
        }

        let verified = verify_new_claim(&self.address, &self.keys, &*host, claim.clone())?;
        debug!(identity = %self.address, %submitter, %signer, nonce, "claim submitted by proxy");
        if self.keys.thresholds().management <= 1 {
            self.engine.next_nonce();
            return Ok(self.store_claim(verified));
        }
        // Staging consumes the nonce for the claim request.
        self.stage_claim(claim, Some(key))
    }

    /// Remove a claim. Allowed for the identity itself, its MANAGEMENT/ACTION keys, the
    /// issuing account and ACTION/MANAGEMENT keys of the issuing identity. Returns
    /// whether a claim was removed.
    pub fn remove_claim(&mut self, caller: Address, id: ClaimId, host: &mut dyn Host) -> Result<bool> {
        let self_side = self.authorize_direct(&caller, &IdentityCall::RemoveClaim { claim_id: id });
        if self_side.is_err() {
            let key = key_of(&caller);
            let issuer_side = self.claims.get_claim(&id).map_or(false, |claim| {
                caller == claim.issuer
                    || [Purpose::Management, Purpose::Action]
                        .iter()
                        .any(|p| host.key_has_purpose(&claim.issuer, &key, *p) == Some(true))
            });
            if !issuer_side {
                return self_side.map(|_| false);
            }
        }
        Ok(self.drop_claim(&id))
    }

    /// Re-verify a stored claim and delete it when its signer is no longer entitled.
    /// Anyone may call this. Returns whether the claim was removed.
    pub fn refresh_claim(&mut self, id: ClaimId, host: &dyn Host) -> bool {
        let Some(claim) = self.claims.get_claim(&id) else {
            return false;
        };
        match reverify_claim(&self.address, &self.keys, host, claim) {
            Ok(_) => false,
            Err(e) => {
                info!(identity = %self.address, claim = %id, error = %e, "claim no longer valid");
                self.drop_claim(&id)
            }
        }
    }

    fn stage_claim(&mut self, claim: NewClaim, approver: Option<KeyId>) -> Result<ClaimOutcome> {
        let claim_id = claim.id();
        let topic = claim.topic;
        let issuer = claim.issuer;
        let data = IdentityCall::AddClaim(claim).encode()?;
        let to = self.address;
        let required = self.keys.thresholds().management;

        let nonce = self.engine.next_nonce();
        let id = DigestVersion::CURRENT.execution_digest(&self.address, &to, 0, &data, nonce);
        let mut approvals = BTreeMap::new();
        if let Some(key) = approver {
            approvals.insert(key, true);
        }
        self.emit(IdentityEvent::ExecutionRequested {
            id,
            to,
            value: 0,
            data: data.clone(),
        });
        self.engine.open(ExecutionRequest {
            id,
            to,
            value: 0,
            data,
            nonce,
            class: ExecutionClass::Management,
            required,
            approvals,
            status: ExecutionStatus::Pending,
        });
        self.emit(IdentityEvent::ClaimRequested {
            request_id: id,
            claim_id,
            topic,
            issuer,
        });
        info!(identity = %self.address, request = %id, claim = %claim_id, "claim request staged");
        Ok(ClaimOutcome::Requested {
            request_id: id,
            claim_id,
        })
    }

    fn store_claim(&mut self, claim: Claim) -> ClaimOutcome {
        let (claim_id, topic, issuer) = (claim.id, claim.topic, claim.issuer);
        if self.claims.upsert(claim) {
            info!(identity = %self.address, claim = %claim_id, topic, "claim added");
            self.emit(IdentityEvent::ClaimAdded { claim_id, topic, issuer });
            ClaimOutcome::Added(claim_id)
        } else {
            info!(identity = %self.address, claim = %claim_id, topic, "claim changed");
            self.emit(IdentityEvent::ClaimChanged { claim_id, topic, issuer });
            ClaimOutcome::Updated(claim_id)
        }
    }

    fn drop_claim(&mut self, id: &ClaimId) -> bool {
        match self.claims.remove(id) {
            Some(claim) => {
                info!(identity = %self.address, claim = %id, "claim removed");
                self.emit(IdentityEvent::ClaimRemoved {
                    claim_id: claim.id,
                    topic: claim.topic,
                    issuer: claim.issuer,
                });
                true
            }
            None => false,
        }
    }

    /// Entry point for calls arriving through the host from another account.
    pub fn handle_call(&mut self, sender: Address, value: u64, data: &[u8], host: &mut dyn Host) -> Result<Vec<u8>> {
        let call = IdentityCall::decode(data)?;
        debug!(identity = %self.address, %sender, value, call = call.signature(), "inbound call");
        match call {
            IdentityCall::Execute { to, value, data } => self.execute(sender, to, value, data, host).map(|e| e.id().0.to_vec()),
            IdentityCall::Approve { id, approve } => self.approve(sender, id, approve, host).map(|e| e.id().0.to_vec()),
            IdentityCall::AddClaim(claim) => self.add_claim(sender, claim, host).map(|o| o.claim_id().0.to_vec()),
            IdentityCall::RemoveClaim { claim_id } => self.remove_claim(sender, claim_id, host).map(|r| vec![u8::from(r)]),
            IdentityCall::RefreshClaim { claim_id } => Ok(vec![u8::from(self.refresh_claim(claim_id, &*host))]),
            other => {
                self.authorize_direct(&sender, &other)?;
                self.apply(other, host)
            }
        }
    }

    /// Apply a management call with the identity's own authority.
    fn apply(&mut self, call: IdentityCall, host: &mut dyn Host) -> Result<Vec<u8>> {
        match call {
            IdentityCall::AddKey { key, purpose, key_type } => {
                self.apply_add_key(key, purpose, key_type);
                Ok(Vec::new())
            }
            IdentityCall::RemoveKey { key, purpose } => self.apply_remove_key(key, purpose).map(|_| Vec::new()),
            IdentityCall::ChangeManagementThreshold { threshold } => {
                self.apply_threshold(Purpose::Management, threshold).map(|_| Vec::new())
            }
            IdentityCall::ChangeActionThreshold { threshold } => {
                self.apply_threshold(Purpose::Action, threshold).map(|_| Vec::new())
            }
            IdentityCall::SetFunc { key, to, selector, allowed } => {
                self.apply_set_func(key, to, selector, allowed).map(|_| Vec::new())
            }
            IdentityCall::AddClaim(claim) => {
                let verified = verify_new_claim(&self.address, &self.keys, &*host, claim)?;
                Ok(self.store_claim(verified).claim_id().0.to_vec())
            }
            IdentityCall::RemoveClaim { claim_id } => Ok(vec![u8::from(self.drop_claim(&claim_id))]),
            IdentityCall::RefreshClaim { claim_id } => Ok(vec![u8::from(self.refresh_claim(claim_id, &*host))]),
            IdentityCall::Execute { .. } | IdentityCall::Approve { .. } => Err(IdentityError::AuthorizationDenied(
                "an identity cannot execute or approve through a call to itself".to_string(),
            )),
        }
    }

    fn authorize_direct(&self, caller: &Address, call: &IdentityCall) -> Result<()> {
        self.authorize(caller, call.direct_purposes(), call.selector(), call.signature())
    }

    /// Direct (non-execute) calls: the identity itself always passes; a key passes when
    /// it holds one of `purposes`, or an allow-list entry for `selector`, whose threshold
    /// is one.
    fn authorize(&self, caller: &Address, purposes: &[Purpose], selector: Selector, signature: &str) -> Result<()> {
        if *caller == self.address {
            return Ok(());
        }
        let key = key_of(caller);
        let mut thresholds = purposes
            .iter()
            .filter(|p| self.keys.key_has_purpose(&key, **p))
            .map(|p| self.keys.threshold_for(*p))
            .collect::<Vec<_>>();
        if self.keys.key_has_purpose(&key, Purpose::Custom)
            && self.engine.is_allowed(&key, &self.address, &selector)
        {
            thresholds.push(self.keys.thresholds().management);
        }

        if thresholds.is_empty() {
            return Err(IdentityError::AuthorizationDenied(format!(
                "{} may not call {}",
                caller, signature
            )));
        }
        if thresholds.iter().all(|t| *t > 1) {
            return Err(IdentityError::AuthorizationDenied(format!(
                "{} needs approval through execute while the threshold is above one",
                signature
            )));
        }
        Ok(())
    }

    fn apply_add_key(&mut self, key: KeyId, purpose: Purpose, key_type: KeyType) {
        if self.keys.insert(key, purpose, key_type) {
            info!(identity = %self.address, %key, %purpose, "key added");
            self.emit(IdentityEvent::KeyAdded { key, purpose, key_type });
        }
    }

    fn apply_remove_key(&mut self, key: KeyId, purpose: Purpose) -> Result<()> {
        if let Some(key_type) = self.keys.remove(&key, purpose)? {
            info!(identity = %self.address, %key, %purpose, "key removed");
            if purpose == Purpose::Custom {
                let revoked = self.engine.revoke_allowed(&key);
                debug!(identity = %self.address, %key, revoked, "allow-list entries revoked");
            }
            self.emit(IdentityEvent::KeyRemoved { key, purpose, key_type });
        }
        Ok(())
    }

    fn apply_threshold(&mut self, purpose: Purpose, threshold: u32) -> Result<()> {
        self.keys.set_threshold(purpose, threshold)?;
        info!(identity = %self.address, %purpose, threshold, "threshold changed");
        self.emit(IdentityEvent::ThresholdChanged { purpose, threshold });
        Ok(())
    }

    fn apply_set_func(&mut self, key: KeyId, to: Address, selector: Selector, allowed: bool) -> Result<()> {
        if self.keys.get_key(&key).is_none() {
            return Err(IdentityError::UnknownKey(key));
        }
        self.engine.set_allowed(key, to, selector, allowed);
        info!(identity = %self.address, %key, %to, selector = %hex::encode(selector), allowed, "function permission set");
        self.emit(IdentityEvent::FunctionPermissionSet {
            key,
            to,
            selector,
            allowed,
        });
        Ok(())
    }

    fn emit(&mut self, event: IdentityEvent) {
        debug!(identity = %self.address, ?event, "identity event");
        self.events.push(event);
    }
}
