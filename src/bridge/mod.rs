//! Bridge process management
//!
//! Handles spawning, supervising and auto-restarting the `hkisy` bridge.

pub mod spawner;
pub mod supervisor;

pub use spawner::{BridgeProcess, BridgeSpawner, OutputStream};
pub use supervisor::{ProcessSupervisor, SupervisorState};
