//! Node configuration.
//!
//! Loaded from a JSON file; `CT_DATABASE_PATH` overrides `database_path`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use table_executor::ExecutorConfig;
use tracing::info;

/// Environment variable overriding [`NodeConfig::database_path`].
pub const DATABASE_PATH_ENV: &str = "CT_DATABASE_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// `SQLite` file shared by every chain.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub log: LogConfig,

    /// One executor per entry.
    pub chains: Vec<ExecutorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: default_level(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tables.db")
}

fn default_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Reads, overrides from the environment, and validates.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed file, or an invalid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config = Self::from_json(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if let Ok(database_path) = std::env::var(DATABASE_PATH_ENV) {
            info!(%database_path, "database path overridden from environment");
            config.database_path = PathBuf::from(database_path);
        }

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// # Errors
    ///
    /// No chains, a repeated chain id, or an invalid executor configuration.
    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            bail!("at least one chain must be configured");
        }
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                bail!("chain {} is configured twice", chain.chain_id);
            }
            chain
                .validate()
                .with_context(|| format!("chain {}", chain.chain_id))?;
        }
        Ok(())
    }
}
