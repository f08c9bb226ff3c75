//! # Harness Configuration
//!
//! Loaded from a TOML file; every field has a default matching the
//! reference regtest scenario, so an empty file is a valid configuration.
//!
//! ```toml
//! [node]
//! p2p_addr = "127.0.0.1:18444"
//! rpc_url = "http://127.0.0.1:18443"
//! rpc_user = "user"
//! rpc_password = "pass"
//!
//! [network]
//! magic = "fabfb5da"
//! protocol_version = 70015
//!
//! [scenario]
//! excessive_block_size = 100000000
//! wait_timeout_secs = 30
//! compact_nonce = "zero"
//!
//! [synthesis]
//! rng_seed = 7
//!
//! [logging]
//! filter = "info,cb_02_compact_relay=debug"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use cb_01_block_synthesis::{SynthesisConfig, ONE_MEGABYTE};
use cb_02_compact_relay::{RelayConfig, PROTOCOL_VERSION, REGTEST_MAGIC};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Complete harness configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub node: NodeSection,
    pub network: NetworkSection,
    pub scenario: ScenarioSection,
    pub synthesis: SynthesisConfig,
    pub logging: LoggingSection,
}

/// Where the node under test listens.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub p2p_addr: String,
    pub rpc_url: String,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            p2p_addr: "127.0.0.1:18444".to_string(),
            rpc_url: "http://127.0.0.1:18443".to_string(),
            rpc_user: None,
            rpc_password: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Message start bytes as 8 hex digits
    pub magic: String,
    pub protocol_version: i32,
    pub user_agent: String,
    pub services: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            magic: hex::encode(REGTEST_MAGIC),
            protocol_version: PROTOCOL_VERSION,
            user_agent: "/cb-harness:0.1.0/".to_string(),
            services: 1,
        }
    }
}

/// How the manually built compact block picks its short-id nonce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoncePolicy {
    #[default]
    Zero,
    Random,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScenarioSection {
    /// Passed to `setexcessiveblock`; also the size of the second big block
    pub excessive_block_size: u64,
    /// Size of the first big block. Defaults to `ONE_MEGABYTE + 1`
    /// (1,000,001); set 1048577 to run it one byte over a binary megabyte.
    pub large_block_size: usize,
    /// Size of the block sent as a manual compact block
    pub compact_block_size: usize,
    /// Blocks mined before any coinbase is spent
    pub maturity_depth: u32,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub compact_nonce: NoncePolicy,
}

impl Default for ScenarioSection {
    fn default() -> Self {
        Self {
            excessive_block_size: 100 * ONE_MEGABYTE as u64,
            large_block_size: ONE_MEGABYTE + 1,
            compact_block_size: 8 * ONE_MEGABYTE,
            maturity_depth: 100,
            wait_timeout_secs: 30,
            poll_interval_ms: 50,
            compact_nonce: NoncePolicy::Zero,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.magic()?;
        if self.scenario.maturity_depth < 3 {
            return Err(ConfigError::Invalid {
                field: "scenario.maturity_depth",
                reason: format!("need at least 3 spendable outputs, got {}", self.scenario.maturity_depth),
            });
        }
        if self.scenario.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "scenario.poll_interval_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn magic(&self) -> Result<[u8; 4], ConfigError> {
        let bytes = hex::decode(&self.network.magic).map_err(|e| ConfigError::Invalid {
            field: "network.magic",
            reason: e.to_string(),
        })?;
        bytes.try_into().map_err(|bytes: Vec<u8>| ConfigError::Invalid {
            field: "network.magic",
            reason: format!("expected 4 bytes, got {}", bytes.len()),
        })
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scenario.poll_interval_ms)
    }

    /// Relay settings for both peer connections.
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        Ok(RelayConfig {
            magic: self.magic()?,
            protocol_version: self.network.protocol_version,
            services: self.network.services,
            user_agent: self.network.user_agent.clone(),
            wait_timeout: self.wait_timeout(),
            poll_interval: self.poll_interval(),
            ..RelayConfig::default()
        })
    }
}
