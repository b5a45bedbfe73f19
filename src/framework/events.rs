//! Inbound events delivered by the managing framework

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration delivery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMessage {
    /// Values of the typed parameters, as entered in the UI
    #[serde(default)]
    pub typed_custom_data: Option<Value>,
    /// First configuration since the node server (re)started
    #[serde(default)]
    pub is_initial_config: bool,
    #[serde(default)]
    pub new_params_detected: bool,
    /// Addresses of the nodes the framework knows about
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Command addressed to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCommand {
    #[serde(rename = "DON")]
    Start,
    #[serde(rename = "DOF")]
    Stop,
    #[serde(rename = "QUERY")]
    Query,
    #[serde(rename = "DISCOVER")]
    Discover,
}

/// Event delivered by the framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FrameworkEvent {
    /// Transport connected; configuration has not arrived yet
    Connected,
    Config(ConfigMessage),
    Poll {
        #[serde(rename = "longPoll", default)]
        long_poll: bool,
    },
    Command {
        address: String,
        command: NodeCommand,
    },
    /// The node server is shutting down
    Stop,
    /// The node server is being removed
    Delete,
    ConnectionEnded,
}

impl FrameworkEvent {
    /// Short name used in logs and task contexts
    pub fn name(&self) -> &'static str {
        match self {
            FrameworkEvent::Connected => "connected",
            FrameworkEvent::Config(_) => "config",
            FrameworkEvent::Poll { .. } => "poll",
            FrameworkEvent::Command { .. } => "command",
            FrameworkEvent::Stop => "stop",
            FrameworkEvent::Delete => "delete",
            FrameworkEvent::ConnectionEnded => "connectionEnded",
        }
    }
}
