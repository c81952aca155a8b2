#![allow(dead_code)]

use sovid_identity::{Address, ClaimScheme, KeyPair, NewClaim};
use sovid_runtime::{Contract, Network};
use std::sync::{Arc, Mutex};

/// Generate a specified number of signer keypairs
pub fn generate_signers(n: usize) -> Vec<KeyPair> {
    (0..n).map(|_| KeyPair::generate()).collect()
}

/// A claim about `subject` issued by `issuer` and signed by `signer`.
pub fn signed_claim(subject: &Address, issuer: Address, signer: &KeyPair, topic: u64, data: &[u8]) -> NewClaim {
    NewClaim {
        topic,
        scheme: ClaimScheme::Ecdsa,
        issuer,
        signature: signer.sign_claim(subject, topic, data).expect("sign claim"),
        data: data.to_vec(),
        uri: format!("https://claims.example.org/{}", topic),
    }
}

/// Grants an achievement to callers holding a claim on `topic` from `issuer`.
pub struct AchievementContract {
    pub topic: u64,
    pub issuer: Address,
    pub granted: Arc<Mutex<Vec<Address>>>,
}

impl Contract for AchievementContract {
    fn call(&mut self, sender: Address, _value: u64, _data: &[u8], network: &Network) -> Result<Vec<u8>, String> {
        let identity = network
            .identity(&sender)
            .ok_or_else(|| format!("{} is not an identity", sender))?;
        let eligible = identity
            .get_claim_ids_by_topic(self.topic)
            .iter()
            .filter_map(|id| identity.get_claim(id))
            .any(|claim| claim.issuer == self.issuer);
        if !eligible {
            return Err(format!("{} holds no claim on topic {}", sender, self.topic));
        }
        self.granted.lock().map_err(|e| e.to_string())?.push(sender);
        Ok(b"granted".to_vec())
    }
}

/// A contract that always fails.
pub struct RevertingContract;

impl Contract for RevertingContract {
    fn call(&mut self, _sender: Address, _value: u64, _data: &[u8], _network: &Network) -> Result<Vec<u8>, String> {
        Err("always reverts".to_string())
    }
}
