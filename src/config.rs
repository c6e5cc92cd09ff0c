//! Runtime configuration
//!
//! Loaded from a JSON file; missing fields take their defaults. The RPC
//! timeout can be overridden with `HALO_MULTISIG_RPC_TIMEOUT_MS`.

use crate::core::{Address, H256};
use crate::multisig::ConfirmationMode;
use crate::provider::multisig_init_code_hash;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`CoordinatorConfig::rpc_timeout_ms`]
pub const RPC_TIMEOUT_ENV: &str = "HALO_MULTISIG_RPC_TIMEOUT_MS";

/// Default config file name inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Factory contract settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Factory address; unset until a network is chosen
    pub address: Option<Address>,
    /// `keccak256` of the multisig creation code the factory deploys
    pub init_code_hash: H256,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            address: None,
            init_code_hash: multisig_init_code_hash(),
        }
    }
}

/// Timeouts and confirmation strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Bound on each RPC call, including waiting for a receipt
    pub rpc_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub confirmation_mode: ConfirmationMode,
}

impl CoordinatorConfig {
    /// Reject settings that would time out every call or spin the poll loop
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "coordinator.rpc_timeout_ms".to_string(),
                value: self.rpc_timeout_ms.to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "coordinator.poll_interval_ms".to_string(),
                value: self.poll_interval_ms.to_string(),
            });
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 60_000,
            poll_interval_ms: 500,
            confirmation_mode: ConfirmationMode::Sequential,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub factory: FactoryConfig,
    pub coordinator: CoordinatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".halo_multisig"),
            factory: FactoryConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` and apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let mut config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.apply_env()?;
        config.coordinator.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env()?;
        config.coordinator.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(RPC_TIMEOUT_ENV) {
            self.coordinator.rpc_timeout_ms = parse_timeout(&value)?;
            log::debug!(
                "RPC timeout set to {}ms from {}",
                self.coordinator.rpc_timeout_ms,
                RPC_TIMEOUT_ENV
            );
        }
        Ok(())
    }
}

fn parse_timeout(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(ConfigError::InvalidValue {
            name: RPC_TIMEOUT_ENV.to_string(),
            value: value.to_string(),
        }),
    }
}
