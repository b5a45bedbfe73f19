//! Bridge process spawning
//!
//! Launches the `hkisy` binary with its fixed `server -config <path>` arguments
//! and forwards its output streams, line by line, into the log.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::NodeServerConfig;
use crate::error::BridgeError;

/// Subcommand the bridge binary is always launched with
pub const BRIDGE_SUBCOMMAND: &str = "server";

/// Flag that precedes the persisted configuration path
pub const BRIDGE_CONFIG_FLAG: &str = "-config";

/// Which output stream a forwarded line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Spawns bridge processes
#[derive(Debug, Clone)]
pub struct BridgeSpawner {
    /// Path of the bridge executable
    pub binary_path: PathBuf,
    /// Path of the persisted configuration handed to the bridge
    pub config_path: PathBuf,
}

impl BridgeSpawner {
    /// Create a new bridge spawner
    pub fn new<P: AsRef<Path>>(binary_path: P, config_path: P) -> Self {
        Self {
            binary_path: binary_path.as_ref().to_path_buf(),
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Create a spawner for the binary and config file named in `config`
    pub fn from_config(config: &NodeServerConfig) -> Self {
        Self::new(config.bridge_binary_path(), config.bridge_config_path())
    }

    /// Arguments the bridge is launched with
    pub fn args(&self) -> Vec<std::ffi::OsString> {
        vec![
            BRIDGE_SUBCOMMAND.into(),
            BRIDGE_CONFIG_FLAG.into(),
            self.config_path.clone().into_os_string(),
        ]
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Spawn a bridge process
    ///
    /// Output forwarding tasks are started before this returns; they end on
    /// their own when the child closes its pipes.
    pub fn spawn(&self) -> Result<BridgeProcess, BridgeError> {
        if !self.binary_path.exists() {
            return Err(BridgeError::BinaryNotFound(self.binary_path.clone()));
        }

        debug!(
            "Spawning bridge: {:?} {:?}",
            self.binary_path,
            self.args()
        );

        let mut child = self.command().spawn().map_err(BridgeError::SpawnFailed)?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, OutputStream::Stdout, pid));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, OutputStream::Stderr, pid));
        }

        info!("Bridge process spawned with pid {:?}", pid);
        Ok(BridgeProcess { child, pid })
    }
}

/// Forward every line of a bridge output stream to the log
async fn forward_output<R>(reader: R, stream: OutputStream, pid: Option<u32>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                OutputStream::Stdout => {
                    info!(target: "hkisy_node::bridge::output", pid = ?pid, "STDOUT: {}", line)
                }
                OutputStream::Stderr => {
                    warn!(target: "hkisy_node::bridge::output", pid = ?pid, "STDERR: {}", line)
                }
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading bridge {:?} output: {}", stream, e);
                break;
            }
        }
    }
}

/// A launched bridge process
#[derive(Debug)]
pub struct BridgeProcess {
    child: Child,
    pid: Option<u32>,
}

impl BridgeProcess {
    /// Get the process ID captured at spawn time
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Ask the process to exit (SIGTERM)
    #[cfg(unix)]
    pub fn terminate(&mut self) -> Result<(), BridgeError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self.pid.ok_or(BridgeError::NoPid)?;
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| {
            BridgeError::SignalFailed {
                pid,
                reason: e.to_string(),
            }
        })
    }

    /// Ask the process to exit (no graceful signal on this platform)
    #[cfg(not(unix))]
    pub fn terminate(&mut self) -> Result<(), BridgeError> {
        self.kill()
    }

    /// Kill the process outright
    pub fn kill(&mut self) -> Result<(), BridgeError> {
        let pid = self.pid.unwrap_or_default();
        self.child
            .start_kill()
            .map_err(|e| BridgeError::SignalFailed {
                pid,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_invocation_arguments() {
        let spawner = BridgeSpawner::new("/opt/bin/hkisy", "/opt/bin/.hkisy.config.json");
        let args: Vec<String> = spawner
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["server", "-config", "/opt/bin/.hkisy.config.json"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let spawner = BridgeSpawner::new(
            dir.path().join("hkisy"),
            dir.path().join(".hkisy.config.json"),
        );
        match spawner.spawn() {
            Err(BridgeError::BinaryNotFound(path)) => assert!(path.ends_with("hkisy")),
            other => panic!("expected BinaryNotFound, got {:?}", other.map(|p| p.id())),
        }
    }
}
