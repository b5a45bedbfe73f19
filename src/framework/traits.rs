//! Outbound interface to the managing framework
//!
//! Everything the node server asks of the framework goes through [`Framework`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FrameworkError;

/// Value type of a typed UI parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

/// A typed parameter shown on the framework's configuration screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedParam {
    /// Key the framework uses when it sends the value back
    pub name: String,
    /// Label shown in the UI
    pub title: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<ParamType>,
}

impl TypedParam {
    /// A required parameter
    pub fn required(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            is_required: true,
            param_type: None,
        }
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }
}

/// Initial value of a node driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverValue {
    pub driver: String,
    pub value: String,
    pub uom: u32,
}

/// A node registered with the framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Node definition id (must match the framework's node profile)
    pub node_def_id: String,
    /// Address of the node's primary (parent) node
    pub primary: String,
    pub address: String,
    pub name: String,
    pub drivers: Vec<DriverValue>,
}

/// One outbound call, as recorded or serialized by the framework adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum FrameworkCall {
    AddNoticeTemp {
        key: String,
        text: String,
        #[serde(rename = "delaySec")]
        duration_secs: u64,
    },
    RemoveNoticesAll,
    SetDriver {
        address: String,
        driver: String,
        value: i64,
        uom: u32,
    },
    SaveTypedParams {
        params: Vec<TypedParam>,
    },
    SetCustomParamsDoc {
        doc: String,
    },
    AddNode {
        node: NodeDefinition,
    },
    DelNode {
        address: String,
    },
    Stop,
}

/// Calls the node server makes into the managing framework
#[async_trait]
pub trait Framework: Send + Sync {
    /// Show a notice that disappears after `duration`
    async fn add_notice_temp(
        &self,
        key: &str,
        text: &str,
        duration: Duration,
    ) -> Result<(), FrameworkError>;

    /// Remove every notice currently shown
    async fn remove_notices_all(&self) -> Result<(), FrameworkError>;

    /// Publish a driver value on a node
    async fn set_driver(
        &self,
        address: &str,
        driver: &str,
        value: i64,
        uom: u32,
    ) -> Result<(), FrameworkError>;

    /// Publish the typed parameter schema for the configuration screen
    async fn save_typed_params(&self, params: &[TypedParam]) -> Result<(), FrameworkError>;

    /// Publish the configuration documentation
    async fn set_custom_params_doc(&self, doc: &str) -> Result<(), FrameworkError>;

    /// Register a node
    async fn add_node(&self, node: NodeDefinition) -> Result<(), FrameworkError>;

    /// Remove a node
    async fn delete_node(&self, address: &str) -> Result<(), FrameworkError>;

    /// Whether a node with this address is registered
    async fn has_node(&self, address: &str) -> bool;

    /// Nodes the framework reported in its latest configuration
    async fn sync_nodes(&self, _nodes: &[String]) {}

    /// Stop the framework interface; the node server is going away
    async fn stop(&self) -> Result<(), FrameworkError>;
}
