//! Configuration management for the node server
//!
//! Handles loading, validation and the derived paths used to launch the bridge.
//! This is the service's own configuration, not the bridge credentials the
//! managing framework delivers at runtime (see [`crate::reconciler`]).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "hkisy_node=debug"); RUST_LOG takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON formatted logs (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Node server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeServerConfig {
    /// Directory holding the bridge binary and its persisted configuration
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// Bridge binary file name inside `bin_dir`
    #[serde(default = "default_bridge_binary")]
    pub bridge_binary: String,

    /// Persisted bridge configuration file name inside `bin_dir`
    #[serde(default = "default_bridge_config_file")]
    pub bridge_config_file: String,

    /// Markdown documentation published to the framework on first config
    #[serde(default = "default_config_doc_path")]
    pub config_doc_path: PathBuf,

    /// Grace period between SIGTERM and considering the bridge stopped
    #[serde(default = "default_stop_grace_millis")]
    pub stop_grace_millis: u64,

    /// Send SIGKILL if the bridge is still alive when the grace period ends
    #[serde(default = "default_true")]
    pub force_kill_after_grace: bool,

    /// Bounded wait for the poll gate before a poll cycle is abandoned
    #[serde(default = "default_poll_lock_timeout_millis")]
    pub poll_lock_timeout_millis: u64,

    /// Controller node address
    #[serde(default = "default_controller_address")]
    pub controller_address: String,

    /// Controller node display name
    #[serde(default = "default_controller_name")]
    pub controller_name: String,

    /// Bridge status node address
    #[serde(default = "default_status_node_address")]
    pub status_node_address: String,

    /// Bridge status node display name
    #[serde(default = "default_status_node_name")]
    pub status_node_name: String,

    /// How long temporary notices stay visible
    #[serde(default = "default_notice_duration_secs")]
    pub notice_duration_secs: u64,

    /// Wait after deleting the status node before adding it again
    #[serde(default = "default_node_recreate_delay_millis")]
    pub node_recreate_delay_millis: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_true() -> bool {
    true
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("./bin")
}

fn default_bridge_binary() -> String {
    "hkisy".to_string()
}

fn default_bridge_config_file() -> String {
    ".hkisy.config.json".to_string()
}

fn default_config_doc_path() -> PathBuf {
    PathBuf::from("./configdoc.md")
}

fn default_stop_grace_millis() -> u64 {
    3000
}

fn default_poll_lock_timeout_millis() -> u64 {
    500
}

fn default_controller_address() -> String {
    "controller".to_string()
}

fn default_controller_name() -> String {
    "HomeKit NodeServer".to_string()
}

fn default_status_node_address() -> String {
    "hk001".to_string()
}

fn default_status_node_name() -> String {
    "HomeKit Bridge".to_string()
}

fn default_notice_duration_secs() -> u64 {
    5
}

fn default_node_recreate_delay_millis() -> u64 {
    3000
}

impl Default for NodeServerConfig {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            bridge_binary: default_bridge_binary(),
            bridge_config_file: default_bridge_config_file(),
            config_doc_path: default_config_doc_path(),
            stop_grace_millis: default_stop_grace_millis(),
            force_kill_after_grace: true,
            poll_lock_timeout_millis: default_poll_lock_timeout_millis(),
            controller_address: default_controller_address(),
            controller_name: default_controller_name(),
            status_node_address: default_status_node_address(),
            status_node_name: default_status_node_name(),
            notice_duration_secs: default_notice_duration_secs(),
            node_recreate_delay_millis: default_node_recreate_delay_millis(),
            logging: None,
        }
    }
}

impl NodeServerConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeServerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, picking the format from the file extension
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            _ => Self::from_json_file(path),
        }
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Full path of the bridge binary
    pub fn bridge_binary_path(&self) -> PathBuf {
        self.bin_dir.join(&self.bridge_binary)
    }

    /// Full path of the persisted bridge configuration
    pub fn bridge_config_path(&self) -> PathBuf {
        self.bin_dir.join(&self.bridge_config_file)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_millis)
    }

    pub fn poll_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_lock_timeout_millis)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_secs(self.notice_duration_secs)
    }

    pub fn node_recreate_delay(&self) -> Duration {
        Duration::from_millis(self.node_recreate_delay_millis)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bridge_binary.trim().is_empty() {
            return Err(anyhow::anyhow!("bridge_binary must not be empty"));
        }
        if self.bridge_config_file.trim().is_empty() {
            return Err(anyhow::anyhow!("bridge_config_file must not be empty"));
        }
        if self.stop_grace_millis == 0 {
            return Err(anyhow::anyhow!(
                "stop_grace_millis must be greater than 0 so the bridge can exit cleanly"
            ));
        }
        if self.poll_lock_timeout_millis == 0 {
            return Err(anyhow::anyhow!(
                "poll_lock_timeout_millis must be greater than 0"
            ));
        }
        if self.controller_address.is_empty() || self.status_node_address.is_empty() {
            return Err(anyhow::anyhow!("node addresses must not be empty"));
        }
        if self.controller_address == self.status_node_address {
            return Err(anyhow::anyhow!(
                "controller and status node must use different addresses"
            ));
        }

        Ok(())
    }
}
