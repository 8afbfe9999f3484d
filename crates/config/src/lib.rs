//! Configuration schema and loader for quorumkv gateways and storage nodes.

use quorumkv_common::NodeAddr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Client-facing listen address.
    pub listen: SocketAddr,

    /// Fixed, ordered list of storage node base URLs. Placement depends on
    /// this order, so it must be identical across gateway restarts.
    pub nodes: Vec<NodeAddr>,

    /// Quorum settings.
    #[serde(default)]
    pub kv: KvConfig,

    /// Health probing settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Hinted-handoff delivery settings.
    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    /// Replication factor (N).
    #[serde(default = "default_n")]
    pub n: usize,

    /// Default read quorum (R).
    #[serde(default = "default_r")]
    pub r: usize,

    /// Default write quorum (W).
    #[serde(default = "default_w")]
    pub w: usize,

    /// Per-call timeout for node reads, writes and hint deliveries.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Default for the `repair` flag on reads.
    #[serde(default = "default_true")]
    pub read_repair: bool,

    /// Whether hints are queued for replicas that miss a write.
    #[serde(default = "default_true")]
    pub hinted_handoff: bool,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            n: default_n(),
            r: default_r(),
            w: default_w(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            read_repair: true,
            hinted_handoff: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Interval between probe rounds.
    #[serde(default = "default_interval_ms")]
    pub probe_interval_ms: u64,

    /// Timeout of a single `/health` probe.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Interval between background hint delivery passes.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Storage node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreNodeConfig {
    /// Listen address of the node's HTTP surface.
    pub listen: SocketAddr,

    /// Capacity of the node's LRU read cache (entries).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

// --- Defaults ---

fn default_n() -> usize {
    3
}
fn default_r() -> usize {
    2
}
fn default_w() -> usize {
    2
}
fn default_rpc_timeout_ms() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}
fn default_interval_ms() -> u64 {
    2000
}
fn default_probe_timeout_ms() -> u64 {
    1000
}
fn default_cache_capacity() -> usize {
    100
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Implemented by every loadable config so the YAML loaders can share code.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

impl Validate for GatewayConfig {
    /// Validate that configuration values are consistent.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("nodes must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.as_str().is_empty() {
                return Err(ConfigError::Invalid("nodes must not contain empty URLs".into()));
            }
            if !seen.insert(node) {
                return Err(ConfigError::Invalid(format!("duplicate node {}", node)));
            }
        }
        if self.kv.n == 0 {
            return Err(ConfigError::Invalid("kv.n must be > 0".into()));
        }
        if self.kv.r == 0 || self.kv.r > self.kv.n {
            return Err(ConfigError::Invalid(format!(
                "kv.r ({}) must be in 1..={}",
                self.kv.r, self.kv.n
            )));
        }
        if self.kv.w == 0 || self.kv.w > self.kv.n {
            return Err(ConfigError::Invalid(format!(
                "kv.w ({}) must be in 1..={}",
                self.kv.w, self.kv.n
            )));
        }
        if self.health.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "health.probe_interval_ms must be > 0".into(),
            ));
        }
        if self.handoff.interval_ms == 0 {
            return Err(ConfigError::Invalid("handoff.interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

impl Validate for StoreNodeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be > 0".into()));
        }
        Ok(())
    }
}

impl GatewayConfig {
    /// Replication factor actually achievable with the configured node list.
    pub fn effective_n(&self) -> usize {
        self.kv.n.min(self.nodes.len())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.kv.rpc_timeout_ms)
    }

    pub fn handoff_interval(&self) -> Duration {
        Duration::from_millis(self.handoff.interval_ms)
    }
}

/// Load a config from a YAML file path.
pub fn load_from_file<T: DeserializeOwned + Validate>(
    path: &std::path::Path,
) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a config from a YAML string.
pub fn load_from_str<T: DeserializeOwned + Validate>(yaml: &str) -> Result<T, ConfigError> {
    let config: T = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
