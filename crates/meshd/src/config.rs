//! Node configuration.
//!
//! Every field has a default, so an empty or partial TOML file is valid.
//! The defaults put all nodes on `localhost`, make the node on port
//! `50010` the coordinator, and use `224.1.1.1:50000` as the group channel.
//!
//! ```toml
//! host = "localhost"
//! base_port = 50010
//!
//! [group]
//! address = "224.1.1.1"
//! port = 50000
//!
//! [timing]
//! heartbeat_interval_ms = 3000
//! connect_timeout_ms = 2000
//! ```
//!
//! The listening port itself comes from the command line.

use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use mesh_core::PeerAddr;

/// Host used for every point-to-point address.
pub const DEFAULT_HOST: &str = "localhost";

/// Port that designates the coordinator.
pub const DEFAULT_BASE_PORT: u16 = 50010;

/// Multicast rendezvous address.
pub const DEFAULT_GROUP_ADDR: Ipv4Addr = Ipv4Addr::new(224, 1, 1, 1);

/// Multicast port shared by all nodes.
pub const DEFAULT_GROUP_PORT: u16 = 50000;

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5_000;

/// Largest inbound point-to-point payload accepted (64 KiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 65_536;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "MESH_CONFIG";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Host this node listens on, and the host the coordinator records
    /// for every admitted member.
    pub host: String,

    /// Point-to-point listening port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// A node whose `port` equals this value is the coordinator.
    pub base_port: u16,

    pub group: GroupConfig,

    pub timing: TimingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupConfig {
    /// Multicast group address
    pub address: Ipv4Addr,

    /// Multicast port
    pub port: u16,

    /// Local interface used to join the group (`0.0.0.0` lets the OS choose)
    pub interface: Ipv4Addr,

    /// Multicast TTL; `1` keeps traffic on the local network
    pub ttl: u32,

    /// Deliver our own datagrams back to local subscribers
    pub loopback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub heartbeat_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Bound on writing an outbound payload and on reading an inbound one
    pub io_timeout_ms: u64,
    pub max_payload_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_BASE_PORT,
            base_port: DEFAULT_BASE_PORT,
            group: GroupConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_GROUP_ADDR,
            port: DEFAULT_GROUP_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            loopback: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Finds and loads the configuration for this process.
    ///
    /// Resolution order: `explicit` path, then `$MESH_CONFIG`, then
    /// `<config_dir>/mesh/config.toml` if it exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Returns a copy listening on `port`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Returns a copy using `host` for point-to-point addressing.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// True if this node takes the coordinator role.
    pub fn is_coordinator(&self) -> bool {
        self.port == self.base_port
    }

    /// The configured (not yet bound) point-to-point address.
    pub fn listen_addr(&self) -> PeerAddr {
        PeerAddr::new(self.host.clone(), self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.timing.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.io_timeout_ms)
    }

    /// Checks values the runtime cannot start with.
    ///
    /// [`NodeConfig::load`] runs this already; call it again after applying
    /// overrides such as [`NodeConfig::with_host`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.timing.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.timing.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "timing.max_payload_bytes must be greater than zero".to_string(),
            ));
        }
        if !self.group.address.is_multicast() {
            return Err(ConfigError::Invalid(format!(
                "group.address {} is not a multicast address",
                self.group.address
            )));
        }
        Ok(())
    }
}

/// Milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Returns `<config_dir>/mesh/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mesh").join("config.toml"))
}

/// Errors loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}
