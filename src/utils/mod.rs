//! Utility modules for fault tolerance and process plumbing

pub mod async_helpers;
pub mod error;
pub mod lock;
pub mod logging;
pub mod signal;

// Re-export commonly used items
pub use async_helpers::{panic_message, spawn_logged};
pub use error::log_error_async;
pub use lock::try_lock_timeout;
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config, install_panic_hook};
pub use signal::{wait_for_shutdown_signal, ShutdownSignal};
