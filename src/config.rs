//! Configuration Module
//!
//! This module defines all configuration structures for the distributor.
//! Configuration is loaded from TOML files and parsed using serde. The path to
//! the settlement key is never stored in the file itself; the file only names
//! the environment variable that holds it.

use crate::chain::TaskCountMode;
use crate::types::UserId;
use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [distribution]
/// batch_size = 10000
/// task_count = "per_obligation"
///
/// [database]
/// url = "sqlite://ledger.db"
///
/// [content_store]
/// api_url = "http://localhost:5001"
///
/// [chain]
/// rpc_url = "http://localhost:8545"
/// contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
/// chain_id = 31337
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub distribution: DistributionConfig,
    pub database: DatabaseConfig,
    pub content_store: ContentStoreConfig,
    pub chain: ChainConfig,
}

/// Controls how obligations are grouped and described to the job contract
///
/// # Fields
/// - `batch_size`: Maximum number of obligations per manifest (default 10000)
/// - `task_count`: What one contract task stands for (see `TaskCountMode`)
/// - `resume_after_user`: Skip every user with an id at or below this one
#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub task_count: TaskCountMode,
    #[serde(default)]
    pub resume_after_user: Option<UserId>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            task_count: TaskCountMode::default(),
            resume_after_user: None,
        }
    }
}

fn default_batch_size() -> usize {
    10_000
}

/// Ledger and user database
///
/// # Fields
/// - `url`: Database connection URL (e.g., "sqlite://ledger.db")
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Content-addressed store (IPFS HTTP API)
#[derive(Debug, Clone, Deserialize)]
pub struct ContentStoreConfig {
    pub api_url: String,
}

/// Job contract connection settings
///
/// # Fields
/// - `rpc_url`: JSON-RPC endpoint of the settlement chain
/// - `contract_address`: Address of the job contract
/// - `chain_id`: Chain id used when signing
/// - `tip`: Optional tip attached to every submitted job
/// - `key_file_env`: Environment variable holding the settlement key path
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub chain_id: u64,
    #[serde(default)]
    pub tip: Option<u64>,
    #[serde(default = "default_key_file_env")]
    pub key_file_env: String,
}

fn default_key_file_env() -> String {
    "KEY_FILE".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.distribution.batch_size == 0 {
            bail!("distribution.batch_size must be a positive integer");
        }
        if u32::try_from(self.distribution.batch_size).is_err() {
            bail!(
                "distribution.batch_size {} exceeds the contract's task count range",
                self.distribution.batch_size
            );
        }
        Ok(())
    }

    /// Resolve the settlement key path from the configured environment variable
    pub fn key_file_path(&self) -> anyhow::Result<PathBuf> {
        let var = &self.chain.key_file_env;
        let path = std::env::var(var)
            .with_context(|| format!("environment variable {var} must point at the settlement key file"))?;
        Ok(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        [database]
        url = "sqlite::memory:"

        [content_store]
        api_url = "http://localhost:5001"

        [chain]
        rpc_url = "http://localhost:8545"
        contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        chain_id = 31337
    "#;

    #[test]
    fn test_defaults_apply_when_distribution_section_is_missing() {
        let config = Config::parse(BASE).unwrap();

        assert_eq!(config.distribution.batch_size, 10_000);
        assert_eq!(config.distribution.task_count, TaskCountMode::PerObligation);
        assert_eq!(config.distribution.resume_after_user, None);
        assert_eq!(config.chain.key_file_env, "KEY_FILE");
        assert_eq!(config.chain.tip, None);
    }

    #[test]
    fn test_explicit_distribution_settings() {
        let content = format!(
            "{BASE}\n[distribution]\nbatch_size = 2\ntask_count = \"per_batch\"\nresume_after_user = 7\n"
        );
        let config = Config::parse(&content).unwrap();

        assert_eq!(config.distribution.batch_size, 2);
        assert_eq!(config.distribution.task_count, TaskCountMode::PerBatch);
        assert_eq!(config.distribution.resume_after_user, Some(7));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let content = format!("{BASE}\n[distribution]\nbatch_size = 0\n");
        let err = Config::parse(&content).unwrap_err();

        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_missing_key_file_variable_is_an_error() {
        let mut config = Config::parse(BASE).unwrap();
        config.chain.key_file_env = "PAYOUT_DISTRIBUTOR_TEST_UNSET_KEY_FILE".to_string();

        assert!(config.key_file_path().is_err());
    }
}
