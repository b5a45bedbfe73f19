//! Interface to the managing framework
//!
//! The framework delivers events (configuration, polls, commands, lifecycle)
//! and receives calls (notices, driver values, node registration). Its
//! transport is not modelled here: [`stdio`] is a plain JSON-lines adapter and
//! [`memory`] keeps everything in process.

pub mod events;
pub mod memory;
pub mod stdio;
pub mod traits;

pub use events::{ConfigMessage, FrameworkEvent, NodeCommand};
pub use memory::RecordingFramework;
pub use stdio::{read_events, StdioFramework};
pub use traits::{
    DriverValue, Framework, FrameworkCall, NodeDefinition, ParamType, TypedParam,
};
