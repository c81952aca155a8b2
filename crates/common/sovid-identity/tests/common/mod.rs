#![allow(dead_code)]

use sovid_identity::{
    Address, ClaimScheme, GenesisConfig, Host, Identity, KeyId, KeyPair, NewClaim, Purpose, SubcallError,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub sender: Address,
    pub to: Address,
    pub value: u64,
    pub data: Vec<u8>,
}

/// Host that records outbound calls and answers key queries from registered identities.
#[derive(Default)]
pub struct TestHost {
    pub calls: Vec<RecordedCall>,
    pub identities: HashMap<Address, Identity>,
    pub reverting: HashSet<Address>,
}

impl Host for TestHost {
    fn call(&mut self, sender: Address, to: Address, value: u64, data: &[u8]) -> Result<Vec<u8>, SubcallError> {
        if self.reverting.contains(&to) {
            return Err(SubcallError::Reverted {
                target: to,
                reason: "target reverted".to_string(),
            });
        }
        self.calls.push(RecordedCall {
            sender,
            to,
            value,
            data: data.to_vec(),
        });
        Ok(b"ok".to_vec())
    }

    fn key_has_purpose(&self, identity: &Address, key: &KeyId, purpose: Purpose) -> Option<bool> {
        self.identities.get(identity).map(|i| i.key_has_purpose(key, purpose))
    }
}

/// An identity whose keys are given explicitly.
pub fn identity_with(
    creator: &KeyPair,
    salt: u64,
    grants: &[(&KeyPair, Purpose)],
    management: u32,
    action: u32,
) -> Identity {
    let mut config = GenesisConfig::new(creator.address, salt).with_thresholds(management, action);
    for (kp, purpose) in grants {
        config = config.with_key(kp.key, *purpose);
    }
    Identity::genesis(config, &TestHost::default()).expect("genesis")
}

/// A claim about `subject` issued by `issuer` and signed by `signer`.
pub fn claim_from(subject: &Address, issuer: Address, signer: &KeyPair, topic: u64, data: &[u8]) -> NewClaim {
    NewClaim {
        topic,
        scheme: ClaimScheme::Ecdsa,
        issuer,
        signature: signer.sign_claim(subject, topic, data).expect("sign claim"),
        data: data.to_vec(),
        uri: format!("https://claims.example.org/{}", topic),
    }
}

/// Addresses that are never identities.
pub fn account(n: u8) -> Address {
    Address([n; 20])
}
