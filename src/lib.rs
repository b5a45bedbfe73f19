//! hkisy-node - HomeKit bridge node server
//!
//! This crate supervises the `hkisy` HomeKit bridge on behalf of a managing
//! node-server framework. It keeps exactly one bridge process alive while it
//! is wanted, restarts it when the configuration delivered by the framework
//! changes, and publishes whether it is running on a status node.
//!
//! ## Components
//!
//! 1. [`bridge`]: process supervision (start, stop with grace, auto-restart)
//! 2. [`reconciler`]: configuration validation, snapshot and restart cycle
//! 3. [`poll`]: serialization of poll cycles with a bounded wait
//! 4. [`node`]: status and controller nodes exposed to the framework
//! 5. [`server`]: event dispatch tying the components together
//!
//! The framework itself is reached through the [`framework::Framework`]
//! trait; [`framework::StdioFramework`] speaks line-delimited JSON.

pub mod bridge;
pub mod config;
pub mod error;
pub mod framework;
pub mod node;
pub mod poll;
pub mod reconciler;
pub mod server;
pub mod utils;

// Re-export config module
pub use config::*;

pub use bridge::{ProcessSupervisor, SupervisorState};
pub use error::{BridgeError, FrameworkError, SnapshotError};
pub use framework::{Framework, FrameworkEvent};
pub use node::{BridgeStatus, StatusBridge};
pub use poll::{PollGate, PollKind, PollOutcome};
pub use reconciler::{ConfigReconciler, ReconcileOutcome};
pub use server::{Dispatch, NodeServer};
