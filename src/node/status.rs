//! Bridge status node
//!
//! Publishes whether the bridge is running on driver `GV0` (1 running,
//! 0 stopped) and turns the node's commands into supervisor transitions.

use std::sync::Arc;
use tracing::{debug, info};

use crate::bridge::ProcessSupervisor;
use crate::error::FrameworkError;
use crate::framework::traits::{DriverValue, Framework, NodeDefinition};

/// Driver carrying the bridge status
pub const STATUS_DRIVER: &str = "GV0";
/// Unit of measure for an index value
pub const UOM_INDEX: u32 = 25;
/// Node definition id of the status node
pub const STATUS_NODE_DEF_ID: &str = "HK";

/// Observable bridge status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Running,
    Stopped,
}

impl BridgeStatus {
    /// Value published on [`STATUS_DRIVER`]
    pub fn driver_value(self) -> i64 {
        match self {
            BridgeStatus::Running => 1,
            BridgeStatus::Stopped => 0,
        }
    }
}

pub struct StatusBridge {
    supervisor: Arc<ProcessSupervisor>,
    framework: Arc<dyn Framework>,
    address: String,
}

impl StatusBridge {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        framework: Arc<dyn Framework>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            supervisor,
            framework,
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current status, read from the supervisor
    pub fn status(&self) -> BridgeStatus {
        if self.supervisor.is_running() {
            BridgeStatus::Running
        } else {
            BridgeStatus::Stopped
        }
    }

    /// Publish the current status
    pub async fn publish(&self) -> Result<BridgeStatus, FrameworkError> {
        let status = self.status();
        self.framework
            .set_driver(&self.address, STATUS_DRIVER, status.driver_value(), UOM_INDEX)
            .await?;
        debug!("Published bridge status {:?}", status);
        Ok(status)
    }

    /// DON: start the bridge, then publish
    pub async fn handle_start_command(&self) -> anyhow::Result<BridgeStatus> {
        info!("Starting bridge on command");
        let started = self.supervisor.start().await;
        // Publish whatever state the start left behind, even on failure
        let published = self.publish().await;
        started?;
        Ok(published?)
    }

    /// DOF: stop the bridge, then publish
    pub async fn handle_stop_command(&self) -> anyhow::Result<BridgeStatus> {
        info!("Stopping bridge on command");
        self.supervisor.stop().await?;
        Ok(self.publish().await?)
    }

    /// QUERY: publish only
    pub async fn handle_query(&self) -> Result<BridgeStatus, FrameworkError> {
        self.publish().await
    }

    /// Node deleted or node server shutting down: stop for good, publish
    /// nothing
    pub async fn handle_delete_or_shutdown(&self) -> anyhow::Result<()> {
        self.supervisor.shutdown().await?;
        Ok(())
    }

    /// Definition used to register the status node under `primary`
    pub fn node_definition(&self, primary: &str, name: &str) -> NodeDefinition {
        NodeDefinition {
            node_def_id: STATUS_NODE_DEF_ID.to_string(),
            primary: primary.to_string(),
            address: self.address.clone(),
            name: name.to_string(),
            drivers: vec![
                DriverValue {
                    driver: "ST".to_string(),
                    value: "1".to_string(),
                    uom: 2,
                },
                DriverValue {
                    driver: STATUS_DRIVER.to_string(),
                    value: String::new(),
                    uom: UOM_INDEX,
                },
            ],
        }
    }
}
