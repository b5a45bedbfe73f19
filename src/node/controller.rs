//! Controller node
//!
//! The controller is the primary node of the node server. It is created on
//! the first configuration when the framework knows no nodes, and it owns the
//! (re)creation of the bridge status node.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NodeServerConfig;
use crate::framework::events::NodeCommand;
use crate::framework::traits::{DriverValue, Framework, NodeDefinition};
use crate::node::status::StatusBridge;

/// Node definition id of the controller node
pub const CONTROLLER_NODE_DEF_ID: &str = "CONTROLLER";
/// Unit of measure for a boolean value
const UOM_BOOLEAN: u32 = 2;

pub struct ControllerNode {
    framework: Arc<dyn Framework>,
    status: Arc<StatusBridge>,
    address: String,
    name: String,
    status_node_name: String,
    notice_duration: Duration,
    recreate_delay: Duration,
}

impl ControllerNode {
    pub fn new(
        config: &NodeServerConfig,
        framework: Arc<dyn Framework>,
        status: Arc<StatusBridge>,
    ) -> Self {
        Self {
            framework,
            status,
            address: config.controller_address.clone(),
            name: config.controller_name.clone(),
            status_node_name: config.status_node_name.clone(),
            notice_duration: config.notice_duration(),
            recreate_delay: config.node_recreate_delay(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn node_definition(&self) -> NodeDefinition {
        NodeDefinition {
            node_def_id: CONTROLLER_NODE_DEF_ID.to_string(),
            primary: self.address.clone(),
            address: self.address.clone(),
            name: self.name.clone(),
            drivers: vec![DriverValue {
                driver: "ST".to_string(),
                value: "1".to_string(),
                uom: UOM_BOOLEAN,
            }],
        }
    }

    /// Register the controller node and announce it
    pub async fn auto_create(&self) -> anyhow::Result<()> {
        info!("Auto-creating controller node {}", self.address);
        self.framework
            .add_node(self.node_definition())
            .await
            .with_context(|| format!("Error creating controller node {}", self.address))?;

        self.framework
            .add_notice_temp(
                "newController",
                "Controller node initialized",
                self.notice_duration,
            )
            .await?;
        Ok(())
    }

    /// (Re)create the bridge status node under the controller
    ///
    /// An existing status node is deleted first, and the framework is given
    /// the recreate delay to forget it before the node is added again.
    pub async fn create_status_node(&self) -> anyhow::Result<()> {
        let address = self.status.address().to_string();

        if self.framework.has_node(&address).await {
            info!("Deleting existing status node {}", address);
            self.framework
                .delete_node(&address)
                .await
                .with_context(|| format!("Error deleting status node {}", address))?;
            tokio::time::sleep(self.recreate_delay).await;
        }

        info!("Adding status node {}", address);
        self.framework
            .add_node(
                self.status
                    .node_definition(&self.address, &self.status_node_name),
            )
            .await
            .with_context(|| format!("Error creating status node {}", address))?;

        self.framework
            .add_notice_temp(
                "newHomeKitBridgeNode",
                "HomeKit Bridge Node initialized",
                self.notice_duration,
            )
            .await?;

        self.status.handle_query().await?;
        Ok(())
    }

    /// Commands addressed to the controller
    pub async fn handle_command(&self, command: NodeCommand) -> anyhow::Result<()> {
        match command {
            NodeCommand::Discover => self.create_status_node().await,
            NodeCommand::Query => {
                self.framework
                    .set_driver(&self.address, "ST", 1, UOM_BOOLEAN)
                    .await?;
                Ok(())
            }
            NodeCommand::Start | NodeCommand::Stop => {
                warn!("Controller does not handle {:?}", command);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ProcessSupervisor;
    use crate::framework::{FrameworkCall, RecordingFramework};

    fn controller(dir: &tempfile::TempDir, framework: Arc<RecordingFramework>) -> ControllerNode {
        let config = NodeServerConfig {
            bin_dir: dir.path().to_path_buf(),
            node_recreate_delay_millis: 10,
            stop_grace_millis: 10,
            ..Default::default()
        };
        let supervisor = ProcessSupervisor::from_config(&config);
        let status = Arc::new(StatusBridge::new(
            supervisor,
            framework.clone(),
            config.status_node_address.clone(),
        ));
        ControllerNode::new(&config, framework, status)
    }

    #[tokio::test]
    async fn test_auto_create_adds_controller_and_notice() {
        let dir = tempfile::TempDir::new().unwrap();
        let framework = Arc::new(RecordingFramework::new());
        let controller = controller(&dir, framework.clone());

        controller.auto_create().await.unwrap();

        assert_eq!(framework.nodes(), vec!["controller".to_string()]);
        assert_eq!(framework.notice_keys(), vec!["newController".to_string()]);
    }

    #[tokio::test]
    async fn test_auto_create_failure_shows_no_notice() {
        let dir = tempfile::TempDir::new().unwrap();
        let framework = Arc::new(RecordingFramework::new());
        framework.fail_add_node(true);
        let controller = controller(&dir, framework.clone());

        let err = controller.auto_create().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Error creating controller node"));
        assert!(framework.notice_keys().is_empty());
    }

    #[tokio::test]
    async fn test_discover_recreates_existing_status_node() {
        let dir = tempfile::TempDir::new().unwrap();
        let framework = Arc::new(RecordingFramework::with_nodes(["controller", "hk001"]));
        let controller = controller(&dir, framework.clone());

        controller
            .handle_command(NodeCommand::Discover)
            .await
            .unwrap();

        let calls = framework.calls();
        let deleted = calls
            .iter()
            .position(|c| matches!(c, FrameworkCall::DelNode { address } if address == "hk001"))
            .unwrap();
        let added = calls
            .iter()
            .position(|c| matches!(c, FrameworkCall::AddNode { node } if node.address == "hk001"))
            .unwrap();
        assert!(deleted < added);
        assert_eq!(
            framework.notice_keys(),
            vec!["newHomeKitBridgeNode".to_string()]
        );
        // The query after creation publishes the stopped bridge
        assert_eq!(framework.driver_values("hk001", "GV0"), vec![0]);
    }

    #[tokio::test]
    async fn test_query_reports_controller_alive() {
        let dir = tempfile::TempDir::new().unwrap();
        let framework = Arc::new(RecordingFramework::new());
        let controller = controller(&dir, framework.clone());

        controller.handle_command(NodeCommand::Query).await.unwrap();
        assert_eq!(framework.driver_values("controller", "ST"), vec![1]);
    }
}
