use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the sovid runtime
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the directory for persistent storage (Sled DB).
    pub storage_path: PathBuf,

    /// Optional log level string (e.g., "info", "debug", "sovid_identity=trace").
    pub log_level: Option<String>,

    /// How deeply identities may call into each other before calls are refused.
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./sovid-data"),
            log_level: None,
            max_call_depth: 8,
        }
    }
}

impl RuntimeConfig {
    /// Read a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse TOML from config file: {}", path.display()))
    }
}
