//! Error types for the node server
//!
//! Each concern gets its own error enum so callers can tell a bridge launch
//! failure apart from a snapshot write failure or a framework call failure.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while launching or signalling the bridge process
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge binary not found: {0:?}")]
    BinaryNotFound(PathBuf),

    #[error("Failed to spawn bridge process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Failed to signal bridge process {pid}: {reason}")]
    SignalFailed { pid: u32, reason: String },

    #[error("Bridge process has no pid (already reaped)")]
    NoPid,
}

/// Errors raised while loading or persisting the configuration snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by outbound calls to the managing framework
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("Framework transport error: {0}")]
    Transport(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FrameworkError {
    fn from(e: serde_json::Error) -> Self {
        FrameworkError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for FrameworkError {
    fn from(e: std::io::Error) -> Self {
        FrameworkError::Transport(e.to_string())
    }
}
