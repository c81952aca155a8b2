use anyhow::{anyhow, Context, Result};
use sled::Db;
use sovid_identity::{Address, Identity};
use std::path::Path;

const IDENTITY_PREFIX: &str = "identity:";

/// A persistent identity store using Sled embedded database.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Opens or creates a Sled database at the specified path.
    pub fn open(path: &Path) -> Result<Self> {
        tracing::info!("Opening Sled database at: {:?}", path);
        let db = sled::open(path).context(format!("Failed to open sled database at {:?}", path))?;
        Ok(Self { db })
    }

    fn identity_key(address: &Address) -> String {
        format!("{}{}", IDENTITY_PREFIX, address)
    }

    pub fn save_identity(&self, identity: &Identity) -> Result<()> {
        let key = Self::identity_key(&identity.address());
        tracing::debug!(key = %key, "Storing identity");
        let data = bincode::serialize(identity).context("Failed to serialize identity")?;
        self.db.insert(key, data)?;
        Ok(())
    }

    pub fn load_identity(&self, address: &Address) -> Result<Identity> {
        let key = Self::identity_key(address);
        tracing::debug!(key = %key, "Loading identity");
        let ivec = self
            .db
            .get(&key)?
            .ok_or_else(|| anyhow!("Identity {} not found (key: {})", address, key))?;
        bincode::deserialize::<Identity>(&ivec).context("Failed to deserialize identity")
    }

    pub fn contains_identity(&self, address: &Address) -> Result<bool> {
        Ok(self.db.contains_key(Self::identity_key(address))?)
    }

    /// Every stored identity, ordered by address.
    pub fn load_identities(&self) -> Result<Vec<Identity>> {
        self.db
            .scan_prefix(IDENTITY_PREFIX)
            .map(|entry| {
                let (key, value) = entry?;
                bincode::deserialize::<Identity>(&value)
                    .with_context(|| format!("Failed to deserialize identity at key {}", String::from_utf8_lossy(&key)))
            })
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().context("Failed to flush sled database")?;
        Ok(())
    }
}
