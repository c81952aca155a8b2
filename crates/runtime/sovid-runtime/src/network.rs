use crate::config::RuntimeConfig;
use crate::sled_storage::SledStore;
use sovid_identity::{
    Address, ClaimId, ClaimOutcome, Execution, GenesisConfig, Host, Identity, IdentityError, IdentityEvent, KeyId,
    KeyType, NewClaim, Purpose, Selector, SubcallError, H256,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// An account with its own code, callable by identities.
///
/// Contracts get a read-only view of the network, e.g. to check the caller's claims.
/// A contract that returns an error must leave its own state untouched.
pub trait Contract {
    fn call(&mut self, sender: Address, value: u64, data: &[u8], network: &Network) -> std::result::Result<Vec<u8>, String>;
}

/// Errors returned by network operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no identity at {0}")]
    UnknownIdentity(Address),

    #[error("address {0} is already in use")]
    AddressInUse(Address),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

/// In-memory host for identities and contracts.
///
/// Calls are serialized through `&mut self`. While an identity executes, readers see its
/// state from before the call, calls back into it are rejected as reentrant, and if its
/// handler fails that earlier state is put back.
pub struct Network {
    identities: BTreeMap<Address, Identity>,
    contracts: HashMap<Address, Box<dyn Contract>>,
    /// Identities currently executing, as they were when their call began
    executing: HashMap<Address, Identity>,
    depth: usize,
    max_call_depth: usize,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}

impl Network {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            identities: BTreeMap::new(),
            contracts: HashMap::new(),
            executing: HashMap::new(),
            depth: 0,
            max_call_depth: config.max_call_depth,
        }
    }

    /// Rebuild a network from every identity in `store`.
    pub fn load_from(config: &RuntimeConfig, store: &SledStore) -> anyhow::Result<Self> {
        let mut network = Self::new(config);
        for identity in store.load_identities()? {
            network.identities.insert(identity.address(), identity);
        }
        info!(identities = network.identities.len(), "network loaded");
        Ok(network)
    }

    /// Write every identity to `store`.
    pub fn persist_to(&self, store: &SledStore) -> anyhow::Result<()> {
        for identity in self.identities.values() {
            store.save_identity(identity)?;
        }
        store.flush()
    }

    pub fn deploy_contract(&mut self, address: Address, contract: Box<dyn Contract>) -> Result<()> {
        if self.is_occupied(&address) {
            return Err(NetworkError::AddressInUse(address));
        }
        info!(%address, "contract deployed");
        self.contracts.insert(address, contract);
        Ok(())
    }

    pub fn create_identity(&mut self, config: GenesisConfig) -> Result<Address> {
        let address = config.address();
        if self.is_occupied(&address) {
            return Err(NetworkError::AddressInUse(address));
        }
        let identity = Identity::genesis(config, &*self)?;
        self.identities.insert(address, identity);
        Ok(address)
    }

    fn is_occupied(&self, address: &Address) -> bool {
        self.identities.contains_key(address) || self.contracts.contains_key(address) || self.executing.contains_key(address)
    }

    pub fn identity(&self, address: &Address) -> Option<&Identity> {
        self.identities.get(address).or_else(|| self.executing.get(address))
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    pub fn drain_events(&mut self, address: &Address) -> Vec<IdentityEvent> {
        self.identities
            .get_mut(address)
            .map(Identity::drain_events)
            .unwrap_or_default()
    }

    pub fn execute(&mut self, identity: Address, caller: Address, to: Address, value: u64, data: Vec<u8>) -> Result<Execution> {
        self.with_identity(identity, |id, host| id.execute(caller, to, value, data, host))
    }

    pub fn approve(&mut self, identity: Address, caller: Address, id: H256, approve: bool) -> Result<Execution> {
        self.with_identity(identity, |ident, host| ident.approve(caller, id, approve, host))
    }

    pub fn delegated_execute(
        &mut self,
        identity: Address,
        to: Address,
        value: u64,
        data: Vec<u8>,
        nonce: u64,
        signature: &[u8],
    ) -> Result<Execution> {
        self.with_identity(identity, |id, host| id.delegated_execute(to, value, data, nonce, signature, host))
    }

    pub fn add_claim(&mut self, identity: Address, caller: Address, claim: NewClaim) -> Result<ClaimOutcome> {
        self.with_identity(identity, |id, host| id.add_claim(caller, claim, host))
    }

    pub fn add_claim_by_proxy(
        &mut self,
        identity: Address,
        submitter: Address,
        claim: NewClaim,
        nonce: u64,
        proxy_signature: &[u8],
    ) -> Result<ClaimOutcome> {
        self.with_identity(identity, |id, host| {
            id.add_claim_by_proxy(submitter, claim, nonce, proxy_signature, host)
        })
    }

    pub fn remove_claim(&mut self, identity: Address, caller: Address, claim_id: ClaimId) -> Result<bool> {
        self.with_identity(identity, |id, host| id.remove_claim(caller, claim_id, host))
    }

    pub fn refresh_claim(&mut self, identity: Address, claim_id: ClaimId) -> Result<bool> {
        self.with_identity(identity, |id, host| Ok(id.refresh_claim(claim_id, &*host)))
    }

    pub fn add_key(&mut self, identity: Address, caller: Address, key: KeyId, purpose: Purpose, key_type: KeyType) -> Result<()> {
        self.with_identity(identity, |id, _| id.add_key(caller, key, purpose, key_type))
    }

    pub fn remove_key(&mut self, identity: Address, caller: Address, key: KeyId, purpose: Purpose) -> Result<()> {
        self.with_identity(identity, |id, _| id.remove_key(caller, key, purpose))
    }

    pub fn change_management_threshold(&mut self, identity: Address, caller: Address, threshold: u32) -> Result<()> {
        self.with_identity(identity, |id, _| id.change_management_threshold(caller, threshold))
    }

    pub fn change_action_threshold(&mut self, identity: Address, caller: Address, threshold: u32) -> Result<()> {
        self.with_identity(identity, |id, _| id.change_action_threshold(caller, threshold))
    }

    pub fn set_func(
        &mut self,
        identity: Address,
        caller: Address,
        key: KeyId,
        to: Address,
        selector: Selector,
        allowed: bool,
    ) -> Result<()> {
        self.with_identity(identity, |id, _| id.set_func(caller, key, to, selector, allowed))
    }

    /// Run `op` against the identity at `address` with the network as its host.
    fn with_identity<T>(
        &mut self,
        address: Address,
        op: impl FnOnce(&mut Identity, &mut Network) -> sovid_identity::Result<T>,
    ) -> Result<T> {
        let mut identity = self
            .identities
            .remove(&address)
            .ok_or(NetworkError::UnknownIdentity(address))?;
        self.executing.insert(address, identity.clone());
        self.depth += 1;

        let result = op(&mut identity, self);

        self.depth -= 1;
        let snapshot = self.executing.remove(&address);
        match result {
            Ok(value) => {
                self.identities.insert(address, identity);
                Ok(value)
            }
            Err(e) => {
                debug!(identity = %address, error = %e, "restoring identity after failed call");
                self.identities.insert(address, snapshot.unwrap_or(identity));
                Err(e.into())
            }
        }
    }
}

impl Host for Network {
    fn call(&mut self, sender: Address, to: Address, value: u64, data: &[u8]) -> std::result::Result<Vec<u8>, SubcallError> {
        if self.depth >= self.max_call_depth {
            warn!(%sender, %to, depth = self.depth, "call depth exceeded");
            return Err(SubcallError::DepthExceeded(self.max_call_depth));
        }
        if self.executing.contains_key(&to) {
            warn!(%sender, %to, "reentrant call rejected");
            return Err(SubcallError::Reentrant(to));
        }

        if let Some(mut contract) = self.contracts.remove(&to) {
            debug!(%sender, %to, value, "calling contract");
            let result = contract.call(sender, value, data, self);
            self.contracts.insert(to, contract);
            return result.map_err(|reason| SubcallError::Reverted { target: to, reason });
        }

        if self.identities.contains_key(&to) {
            debug!(%sender, %to, value, "calling identity");
            return self
                .with_identity(to, |identity, host| identity.handle_call(sender, value, data, host))
                .map_err(|e| SubcallError::Reverted {
                    target: to,
                    reason: e.to_string(),
                });
        }

        debug!(%sender, %to, value, "call to plain account");
        Ok(Vec::new())
    }

    fn key_has_purpose(&self, identity: &Address, key: &KeyId, purpose: Purpose) -> Option<bool> {
        self.identity(identity).map(|i| i.key_has_purpose(key, purpose))
    }
}
