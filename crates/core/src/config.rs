//! Configuration management for the mesh.

use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub topology: TopologyConfig,
    pub rate_limit: RateLimitConfig,
    pub ledger: LedgerConfig,
    pub drain: DrainConfig,
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name of this mesh deployment
    pub mesh_id: String,
    /// Capacity of the event bus channel
    pub event_capacity: usize,
}

/// Radio-free reachability model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Base maximum range between two nodes
    pub base_range: f64,
    /// Altitude difference above which the range is derated
    pub altitude_threshold: f64,
    /// Multiplier applied past the altitude threshold
    pub altitude_derate: f64,
    /// Battery level below which the range is derated
    pub low_battery_threshold: f64,
    /// Multiplier applied when either endpoint is below the battery threshold
    pub low_battery_derate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Rolling window length in seconds
    pub window_secs: u64,
    /// Admissions allowed per sender per window
    pub max_messages: usize,
}

/// Storage backend for the message ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// SQLite database path (`:memory:` allowed)
    pub path: String,
    /// Message time-to-live in seconds
    pub ttl_secs: u64,
    /// Interval between expiry purges in seconds
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    pub enabled: bool,
    /// Tick interval in seconds
    pub interval_secs: u64,
    /// Battery percentage removed from each active node per tick
    pub step: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// RSA modulus size for node identities
    pub rsa_bits: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            node: NodeConfig::default(),
            topology: TopologyConfig::default(),
            rate_limit: RateLimitConfig::default(),
            ledger: LedgerConfig::default(),
            drain: DrainConfig::default(),
            crypto: CryptoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mesh_id: "himalayan-mesh".to_string(),
            event_capacity: 1000,
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            base_range: 50.0,
            altitude_threshold: 2000.0,
            altitude_derate: 0.7,
            low_battery_threshold: 20.0,
            low_battery_derate: 0.8,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_messages: 10,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            path: "messages.db".to_string(),
            ttl_secs: 24 * 60 * 60,
            purge_interval_secs: 60,
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            step: 0.5,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self { rsa_bits: 2048 }
    }
}
