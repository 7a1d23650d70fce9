//! Execution engine configuration.
//!
//! Values come from three layers, lowest priority first: built-in
//! defaults, an optional TOML file, and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Confirmation depth used when none is configured.
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 5;

/// Priority fee fallback in wei (1 gwei) for nodes that do not answer
/// `eth_maxPriorityFeePerGas`.
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_000_000_000;

/// Environment variable names.
mod env {
    pub const RPC_URL: &str = "DEPLOYKIT_RPC_URL";
    pub const REQUIRED_CONFIRMATIONS: &str = "DEPLOYKIT_REQUIRED_CONFIRMATIONS";
    pub const PRIORITY_FEE_WEI: &str = "DEPLOYKIT_PRIORITY_FEE_WEI";
}

/// Settings of one deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// JSON-RPC endpoint transactions are sent through.
    pub rpc_url: String,
    /// Blocks a replacement must be behind the head before the engine
    /// treats it as final.
    pub required_confirmations: u64,
    /// Priority fee in wei used when the node does not suggest one.
    pub priority_fee_wei: u128,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            priority_fee_wei: DEFAULT_PRIORITY_FEE_WEI,
        }
    }
}

impl ExecutionConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(env::RPC_URL) {
            config.rpc_url = url;
        }
        if let Some(value) = parse_env(env::REQUIRED_CONFIRMATIONS) {
            config.required_confirmations = value;
        }
        if let Some(value) = parse_env(env::PRIORITY_FEE_WEI) {
            config.priority_fee_wei = value;
        }
        config
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {path:?}"))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config from {path:?}"))
    }

    /// Log the effective configuration at startup.
    pub fn log_config(&self) {
        info!(
            rpc_url = %self.rpc_url,
            required_confirmations = self.required_confirmations,
            priority_fee_wei = self.priority_fee_wei,
            "execution configuration"
        );
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}
