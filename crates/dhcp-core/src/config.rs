//! Configuration types for the DHCP sync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where IP address records come from
    pub identity_store: IdentityStoreConfig,

    /// Where DHCP/DNS server records are kept
    #[serde(default)]
    pub target_store: TargetStoreConfig,

    /// How entries reach DHCP servers
    #[serde(default)]
    pub transport: TransportConfig,

    /// Optional coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl SyncConfig {
    /// Create a configuration reading identities from `identity_path`
    pub fn new(identity_path: impl Into<String>) -> Self {
        Self {
            identity_store: IdentityStoreConfig::File {
                path: identity_path.into(),
            },
            target_store: TargetStoreConfig::default(),
            transport: TransportConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.identity_store.validate()?;
        self.target_store.validate()?;
        self.transport.validate()?;
        self.coordinator.validate()?;
        Ok(())
    }
}

/// Identity store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityStoreConfig {
    /// JSON snapshot exported by the inventory
    File {
        /// Path to the snapshot
        path: String,
    },

    /// Custom identity store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IdentityStoreConfig {
    /// Validate the identity store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IdentityStoreConfig::File { path } if path.is_empty() => Err(crate::Error::config(
                "Identity store path cannot be empty",
            )),
            IdentityStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom identity store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Registered factory name for this configuration
    pub fn type_name(&self) -> &str {
        match self {
            IdentityStoreConfig::File { .. } => "file",
            IdentityStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Target store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetStoreConfig {
    /// File-based target store
    File {
        /// Path to the target file
        path: String,
    },

    /// In-memory target store (not persistent)
    #[default]
    Memory,

    /// Custom target store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl TargetStoreConfig {
    /// Validate the target store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TargetStoreConfig::File { path } if path.is_empty() => Err(crate::Error::config(
                "Target store path cannot be empty",
            )),
            TargetStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom target store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Registered factory name for this configuration
    pub fn type_name(&self) -> &str {
        match self {
            TargetStoreConfig::File { .. } => "file",
            TargetStoreConfig::Memory => "memory",
            TargetStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Push transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// JSON over HTTP(S) to an agent on each DHCP server
    Http {
        /// Agent port on the DHCP server
        #[serde(default = "default_push_port")]
        port: u16,
        /// Request path
        #[serde(default = "default_push_path")]
        path: String,
        /// Bearer token (never logged)
        #[serde(default)]
        token: Option<String>,
        /// Use HTTPS
        #[serde(default)]
        use_tls: bool,
        /// Request timeout (in seconds)
        #[serde(default = "default_push_timeout_secs")]
        timeout_secs: u64,
        /// Log what would be pushed without sending it
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom transport
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl TransportConfig {
    /// Validate the transport configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TransportConfig::Http {
                port,
                path,
                timeout_secs,
                token,
                ..
            } => {
                if *port == 0 {
                    return Err(crate::Error::config("HTTP push port must be > 0"));
                }
                if !path.starts_with('/') {
                    return Err(crate::Error::config("HTTP push path must start with '/'"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("HTTP push timeout must be > 0"));
                }
                if token.as_deref().is_some_and(str::is_empty) {
                    return Err(crate::Error::config(
                        "HTTP push token cannot be empty when set",
                    ));
                }
                Ok(())
            }
            TransportConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom transport factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom transport config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the transport type name
    pub fn type_name(&self) -> &str {
        match self {
            TransportConfig::Http { .. } => "http",
            TransportConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Http {
            port: default_push_port(),
            path: default_push_path(),
            token: None,
            use_tls: false,
            timeout_secs: default_push_timeout_secs(),
            dry_run: false,
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Time between sync runs (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum number of DHCP servers pushed to at the same time
    #[serde(default = "default_max_concurrent_pushes")]
    pub max_concurrent_pushes: usize,

    /// Capacity of the event channel
    ///
    /// When full, events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Run one sync immediately when the loop starts
    #[serde(default = "default_sync_on_start")]
    pub sync_on_start: bool,
}

impl CoordinatorConfig {
    /// Validate the coordinator configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Sync interval must be > 0"));
        }
        if self.max_concurrent_pushes == 0 {
            return Err(crate::Error::config("max_concurrent_pushes must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_concurrent_pushes: default_max_concurrent_pushes(),
            event_channel_capacity: default_event_channel_capacity(),
            sync_on_start: default_sync_on_start(),
        }
    }
}

fn default_push_port() -> u16 {
    8067
}

fn default_push_path() -> String {
    "/dhcp/entries".to_string()
}

fn default_push_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    300
}

fn default_max_concurrent_pushes() -> usize {
    8
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_sync_on_start() -> bool {
    true
}
