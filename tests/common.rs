//! Shared helpers for integration tests
//!
//! Each fake bridge is a shell script named `hkisy` in its own temporary bin
//! directory. Every launch appends its arguments to `launches.log`, so tests
//! can count launches without racing the supervisor.

#![allow(dead_code)]

use hkisy_node::bridge::BridgeSpawner;
use hkisy_node::{NodeServerConfig, ProcessSupervisor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const LAUNCH_LOG: &str = "launches.log";
pub const TERM_LOG: &str = "terminated.log";

/// Bridge behaviour after it records its launch
pub enum BridgeBehavior {
    /// Runs until terminated
    LongRunning,
    /// Exits with status 3 shortly after starting
    Crashing,
    /// Ignores SIGTERM; only SIGKILL ends it
    IgnoresTerm,
    /// Writes `terminated.log` when SIGTERM arrives, then exits
    RecordsTerm,
}

pub struct FakeBridge {
    pub dir: TempDir,
}

impl FakeBridge {
    pub fn new(behavior: BridgeBehavior) -> Self {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join(LAUNCH_LOG);

        // The trap must be in place before the launch is recorded
        let term_trap = format!(
            "trap 'echo term >> \"{}\"; kill $!; exit 0' TERM\n",
            dir.path().join(TERM_LOG).display()
        );
        let (prelude, body) = match behavior {
            BridgeBehavior::LongRunning => (String::new(), "exec sleep 30"),
            BridgeBehavior::Crashing => (String::new(), "sleep 0.2\nexit 3"),
            BridgeBehavior::IgnoresTerm => ("trap '' TERM\n".to_string(), "exec sleep 30"),
            BridgeBehavior::RecordsTerm => (term_trap, "sleep 30 &\nwait"),
        };
        let script = format!(
            "#!/bin/sh\n{}echo \"$@\" >> '{}'\necho \"bridge up\"\n{}\n",
            prelude,
            log.display(),
            body
        );

        let path = dir.path().join("hkisy");
        std::fs::write(&path, script).unwrap();
        make_executable(&path);

        Self { dir }
    }

    pub fn bin_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(".hkisy.config.json")
    }

    /// Arguments of every launch so far, oldest first
    pub fn launches(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join(LAUNCH_LOG))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn launch_count(&self) -> usize {
        self.launches().len()
    }

    /// Whether the bridge has handled a SIGTERM
    pub fn term_received(&self) -> bool {
        self.dir.path().join(TERM_LOG).exists()
    }

    /// Node server configuration pointing at this bridge
    pub fn config(&self, stop_grace: Duration) -> NodeServerConfig {
        NodeServerConfig {
            bin_dir: self.bin_dir().to_path_buf(),
            config_doc_path: self.bin_dir().join("configdoc.md"),
            stop_grace_millis: stop_grace.as_millis() as u64,
            node_recreate_delay_millis: 10,
            ..Default::default()
        }
    }

    pub fn supervisor(&self, stop_grace: Duration, force_kill: bool) -> Arc<ProcessSupervisor> {
        ProcessSupervisor::new(
            BridgeSpawner::new(self.bin_dir().join("hkisy"), self.config_path()),
            stop_grace,
            force_kill,
        )
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Poll `condition` every 20ms until it holds or `timeout` passes
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Whether a process with this pid still exists
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

/// A complete bridge configuration
pub fn valid_bridge_config() -> serde_json::Value {
    serde_json::json!({
        "isy-host": "h",
        "isy-user": "u",
        "isy-password": "p",
        "port": 8080,
        "pin": "1234"
    })
}
