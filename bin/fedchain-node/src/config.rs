//! Node configuration

use anyhow::{bail, Context, Result};
use fedchain_ledger::LedgerConfig;
use fedchain_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Node configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Seed the demo round and init audit event at startup
    #[serde(default = "default_seed_ledger")]
    pub seed_ledger: bool,
}

fn default_seed_ledger() -> bool {
    true
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            tracker: TrackerConfig::default(),
            seed_ledger: default_seed_ledger(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ledger.legacy_quorum_threshold == 0 {
            bail!("ledger.legacy_quorum_threshold must be > 0");
        }
        self.tracker
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid tracker config: {e}"))?;
        Ok(())
    }
}
