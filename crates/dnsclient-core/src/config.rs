//! Configuration types for the DNS client sync daemon
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default location of the resolver configuration file
pub const DEFAULT_RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Default poll interval of the snapshot file store (in milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Resolver file configuration
    #[serde(default)]
    pub resolver: ResolverFileConfig,

    /// Config store configuration
    #[serde(default)]
    pub store: ConfigStoreConfig,

    /// Sync driver settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Administrative control channel settings
    #[serde(default)]
    pub control: ControlConfig,

    /// Limits applied when projecting rows into the desired state
    #[serde(default)]
    pub limits: Limits,
}

impl DaemonConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.resolver.validate()?;
        self.store.validate()?;
        self.driver.validate()?;
        self.control.validate()?;
        self.limits.validate()?;
        Ok(())
    }
}

/// Resolver configuration file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverFileConfig {
    /// Path of the file consumed by the system resolver library
    #[serde(default = "default_resolv_conf_path")]
    pub path: String,
}

impl ResolverFileConfig {
    /// Validate the resolver file configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.path.is_empty() {
            return Err(crate::Error::config("Resolver file path cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ResolverFileConfig {
    fn default() -> Self {
        Self {
            path: default_resolv_conf_path(),
        }
    }
}

/// Config store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigStoreConfig {
    /// JSON snapshot file, polled for changes
    File {
        /// Path to the snapshot file
        path: String,
        /// Poll interval in milliseconds
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },

    /// In-process store (embedding and tests)
    #[default]
    Memory,
}

impl ConfigStoreConfig {
    /// Validate the config store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ConfigStoreConfig::File {
                path,
                poll_interval_ms,
            } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Config store file path cannot be empty"));
                }
                if *poll_interval_ms == 0 {
                    return Err(crate::Error::config(
                        "Config store poll interval must be > 0",
                    ));
                }
                Ok(())
            }
            ConfigStoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            ConfigStoreConfig::File { .. } => "file",
            ConfigStoreConfig::Memory => "memory",
        }
    }
}

/// Sync driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Delay before re-checking system readiness after a deferred cycle
    /// (in milliseconds)
    #[serde(default = "default_readiness_backoff_ms")]
    pub readiness_backoff_ms: u64,

    /// Capacity of the driver event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DriverConfig {
    /// Readiness backoff as a [`Duration`]
    pub fn readiness_backoff(&self) -> Duration {
        Duration::from_millis(self.readiness_backoff_ms)
    }

    /// Validate the driver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.readiness_backoff_ms == 0 {
            return Err(crate::Error::config("Readiness backoff must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            readiness_backoff_ms: default_readiness_backoff_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Administrative control channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Unix socket to accept `exit`, `status` and `diag-dump` requests on.
    /// No socket is bound when unset.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Capacity of the channel between the socket and the driver loop
    #[serde(default = "default_control_channel_capacity")]
    pub channel_capacity: usize,
}

impl ControlConfig {
    /// Validate the control configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.socket_path.as_ref().is_some_and(|p| p.is_empty()) {
            return Err(crate::Error::config("Control socket path cannot be empty"));
        }
        if self.channel_capacity == 0 {
            return Err(crate::Error::config("Control channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            channel_capacity: default_control_channel_capacity(),
        }
    }
}

/// Upper bounds applied to the projected desired state
///
/// These mirror what the resolver library honours (three name servers, six
/// search domains) and what the management CLI accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of `nameserver` lines
    #[serde(default = "default_max_name_servers")]
    pub max_name_servers: usize,

    /// Maximum number of entries on the `search` line
    #[serde(default = "default_max_search_domains")]
    pub max_search_domains: usize,

    /// Maximum number of host-address lines
    #[serde(default = "default_max_host_mappings")]
    pub max_host_mappings: usize,

    /// Maximum length of any single name or address
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,
}

impl Limits {
    /// Validate the limits
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_name_servers == 0
            || self.max_search_domains == 0
            || self.max_host_mappings == 0
            || self.max_value_len == 0
        {
            return Err(crate::Error::config("Limits must all be > 0"));
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_servers: default_max_name_servers(),
            max_search_domains: default_max_search_domains(),
            max_host_mappings: default_max_host_mappings(),
            max_value_len: default_max_value_len(),
        }
    }
}

fn default_resolv_conf_path() -> String {
    DEFAULT_RESOLV_CONF_PATH.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_readiness_backoff_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_control_channel_capacity() -> usize {
    16
}

fn default_max_name_servers() -> usize {
    3
}

fn default_max_search_domains() -> usize {
    6
}

fn default_max_host_mappings() -> usize {
    6
}

fn default_max_value_len() -> usize {
    64
}
