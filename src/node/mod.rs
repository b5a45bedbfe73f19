//! Framework nodes exposed by the node server
//!
//! The controller node is the primary node; the status node mirrors whether
//! the bridge is running and accepts start/stop/query commands.

pub mod controller;
pub mod status;

pub use controller::{ControllerNode, CONTROLLER_NODE_DEF_ID};
pub use status::{BridgeStatus, StatusBridge, STATUS_DRIVER, STATUS_NODE_DEF_ID, UOM_INDEX};
