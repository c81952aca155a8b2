use crate::error::{IdentityError, Result};
use serde::{Deserialize, Serialize};
use sovid_crypto::{keccak256, Address, H256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a key: `keccak256(address)` of the controlling account.
pub type KeyId = H256;

/// Derive the key id controlled by `address`.
pub fn key_of(address: &Address) -> KeyId {
    keccak256(address.as_bytes())
}

/// What a key is allowed to do. Numeric codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Purpose {
    /// Manage keys, thresholds and claims of the identity
    Management = 1,
    /// Execute calls against other accounts
    Action = 2,
    /// Sign claims
    Claim = 3,
    Encrypt = 4,
    Assist = 5,
    Delegate = 6,
    /// Add keys (but not remove them) when management keys are lost
    Restore = 7,
    /// Execute only allow-listed `(to, selector)` pairs
    Custom = 8,
}

impl Purpose {
    pub const ALL: [Purpose; 8] = [
        Purpose::Management,
        Purpose::Action,
        Purpose::Claim,
        Purpose::Encrypt,
        Purpose::Assist,
        Purpose::Delegate,
        Purpose::Restore,
        Purpose::Custom,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Purpose::Management => "management",
            Purpose::Action => "action",
            Purpose::Claim => "claim",
            Purpose::Encrypt => "encrypt",
            Purpose::Assist => "assist",
            Purpose::Delegate => "delegate",
            Purpose::Restore => "restore",
            Purpose::Custom => "custom",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown purpose code {}", code));
        }
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == lower)
            .ok_or_else(|| format!("unknown purpose '{}'", s))
    }
}

/// Key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    Ecdsa = 1,
}

/// A key and the purposes it has been granted, in grant order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub key_type: KeyType,
    pub purposes: Vec<Purpose>,
}

impl Key {
    pub fn has_purpose(&self, purpose: Purpose) -> bool {
        self.purposes.contains(&purpose)
    }
}

/// Approvals needed per execution class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub management: u32,
    pub action: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            management: 1,
            action: 1,
        }
    }
}

/// The keys controlling one identity.
///
/// Pure bookkeeping: authorization is enforced by [`crate::Identity`]. Mutators
/// check their invariants before touching any state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyStore {
    keys: BTreeMap<KeyId, Key>,
    by_purpose: BTreeMap<Purpose, Vec<KeyId>>,
    thresholds: Thresholds,
}

impl KeyStore {
    pub fn key_has_purpose(&self, key: &KeyId, purpose: Purpose) -> bool {
        self.keys.get(key).map_or(false, |k| k.has_purpose(purpose))
    }

    pub fn get_key(&self, key: &KeyId) -> Option<&Key> {
        self.keys.get(key)
    }

    /// Keys holding `purpose`, in the order they were granted it.
    pub fn get_keys_by_purpose(&self, purpose: Purpose) -> &[KeyId] {
        self.by_purpose.get(&purpose).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn count(&self, purpose: Purpose) -> usize {
        self.get_keys_by_purpose(purpose).len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.values()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Threshold governing direct use of `purpose`: ACTION keys answer to the action
    /// threshold, every other purpose to the management threshold.
    pub fn threshold_for(&self, purpose: Purpose) -> u32 {
        match purpose {
            Purpose::Action => self.thresholds.action,
            _ => self.thresholds.management,
        }
    }

    /// Grant `purpose` to `key`. Returns `false` when it was already held.
    pub(crate) fn insert(&mut self, key: KeyId, purpose: Purpose, key_type: KeyType) -> bool {
        let entry = self.keys.entry(key).or_insert_with(|| Key {
            id: key,
            key_type,
            purposes: Vec::new(),
        });
        if entry.has_purpose(purpose) {
            return false;
        }
        entry.purposes.push(purpose);
        self.by_purpose.entry(purpose).or_default().push(key);
        true
    }

    /// Revoke `purpose` from `key`, returning the key type when something was revoked.
    /// Dropping the last ACTION key is allowed while the action threshold is one.
    pub(crate) fn remove(&mut self, key: &KeyId, purpose: Purpose) -> Result<Option<KeyType>> {
        let Some(existing) = self.keys.get(key) else {
            return Ok(None);
        };
        if !existing.has_purpose(purpose) {
            return Ok(None);
        }
        let key_type = existing.key_type;

        let remaining = self.count(purpose) - 1;
        let floor = match purpose {
            Purpose::Management => Some(self.thresholds.management),
            Purpose::Action if remaining > 0 || self.thresholds.action > 1 => Some(self.thresholds.action),
            _ => None,
        };
        if let Some(threshold) = floor {
            if (remaining as u64) < u64::from(threshold) {
                return Err(IdentityError::InvariantViolation(format!(
                    "removing {} key would leave {} keys below threshold {}",
                    purpose, remaining, threshold
                )));
            }
        }

        if let Some(k) = self.keys.get_mut(key) {
            k.purposes.retain(|p| *p != purpose);
            if k.purposes.is_empty() {
                self.keys.remove(key);
            }
        }
        if let Some(ids) = self.by_purpose.get_mut(&purpose) {
            ids.retain(|id| id != key);
            if ids.is_empty() {
                self.by_purpose.remove(&purpose);
            }
        }
        Ok(Some(key_type))
    }

    /// Check `1 ≤ threshold ≤ count(purpose)`.
    pub(crate) fn check_threshold(&self, purpose: Purpose, threshold: u32) -> Result<()> {
        let available = self.count(purpose);
        if threshold == 0 {
            return Err(IdentityError::InvariantViolation(format!(
                "{} threshold must be at least 1",
                purpose
            )));
        }
        if u64::from(threshold) > available as u64 {
            return Err(IdentityError::InvariantViolation(format!(
                "{} threshold ({}) exceeds the number of {} keys ({})",
                purpose, threshold, purpose, available
            )));
        }
        Ok(())
    }

    pub(crate) fn set_threshold(&mut self, purpose: Purpose, threshold: u32) -> Result<()> {
        match purpose {
            Purpose::Management | Purpose::Action => {}
            other => {
                return Err(IdentityError::InvariantViolation(format!(
                    "{} keys have no threshold",
                    other
                )))
            }
        }
        self.check_threshold(purpose, threshold)?;
        match purpose {
            Purpose::Action => self.thresholds.action = threshold,
            _ => self.thresholds.management = threshold,
        }
        Ok(())
    }

    /// Install genesis thresholds. An action threshold of one is accepted without any
    /// ACTION keys.
    pub(crate) fn init_thresholds(&mut self, thresholds: Thresholds) -> Result<()> {
        self.check_threshold(Purpose::Management, thresholds.management)?;
        if thresholds.action != 1 {
            self.check_threshold(Purpose::Action, thresholds.action)?;
        }
        self.thresholds = thresholds;
        Ok(())
    }
}
