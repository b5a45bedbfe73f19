//! Bridge process supervisor
//!
//! Owns the single bridge process and its two-state lifecycle:
//!
//! ```text
//!            start()                     unplanned exit, desired_running
//! STOPPED ------------> RUNNING <-----------------------------------+
//!    ^                    |  |                                      |
//!    |  stop() / exit     |  +------------ relaunch ----------------+
//!    +--------------------+
//!       (desired_running = false)
//! ```
//!
//! `desired_running` decides whether an exit leads back to RUNNING. It is
//! cleared before `stop()` sends SIGTERM so the exit that follows cannot be
//! mistaken for a crash. Restarts have no backoff and no ceiling; every restart
//! is counted and logged so a crash loop is visible.
//!
//! `shutdown()` is terminal: once called, `start()` and auto-restart are
//! no-ops, so a transition queued behind it cannot bring the bridge back.

use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};
use tracing::{debug, error, info, warn};

use crate::bridge::spawner::{BridgeProcess, BridgeSpawner};
use crate::config::NodeServerConfig;
use crate::error::BridgeError;

/// Supervisor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No bridge process is executing
    Stopped,
    /// A bridge process is executing
    Running,
}

/// Signal forwarded to the task that owns a running child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TerminationSignal {
    Terminate,
    Kill,
}

/// Signal request; `delivered` fires once the signal has been sent
#[derive(Debug)]
struct SignalRequest {
    signal: TerminationSignal,
    delivered: oneshot::Sender<()>,
}

/// Exit notification sent by a child's watcher task
#[derive(Debug)]
struct BridgeExit {
    generation: u64,
    pid: Option<u32>,
    status: Option<ExitStatus>,
}

/// Handle to the executing bridge
#[derive(Debug)]
struct RunningBridge {
    generation: u64,
    pid: Option<u32>,
    signal_tx: mpsc::UnboundedSender<SignalRequest>,
}

impl RunningBridge {
    /// The watcher drops its receiver once the child has been reaped
    fn is_alive(&self) -> bool {
        !self.signal_tx.is_closed()
    }

    /// Ask the watcher to signal the child; `None` if it has already exited
    fn signal(&self, signal: TerminationSignal) -> Option<oneshot::Receiver<()>> {
        let (delivered, delivery) = oneshot::channel();
        self.signal_tx
            .send(SignalRequest { signal, delivered })
            .ok()
            .map(|_| delivery)
    }
}

#[derive(Debug, Default)]
struct SupervisedProcess {
    handle: Option<RunningBridge>,
    desired_running: bool,
    shut_down: bool,
    generation: u64,
    launches: u64,
    restarts: u64,
}

/// Supervises the bridge process
pub struct ProcessSupervisor {
    spawner: BridgeSpawner,
    stop_grace: Duration,
    force_kill_after_grace: bool,
    /// Never held across an await
    state: Mutex<SupervisedProcess>,
    /// Serializes start, stop and auto-restart
    transition: TokioMutex<()>,
    exit_tx: mpsc::UnboundedSender<BridgeExit>,
}

impl ProcessSupervisor {
    /// Create a new supervisor and start its exit observer
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        spawner: BridgeSpawner,
        stop_grace: Duration,
        force_kill_after_grace: bool,
    ) -> Arc<Self> {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        let supervisor = Arc::new(Self {
            spawner,
            stop_grace,
            force_kill_after_grace,
            state: Mutex::new(SupervisedProcess::default()),
            transition: TokioMutex::new(()),
            exit_tx,
        });

        tokio::spawn(Self::observe_exits(Arc::downgrade(&supervisor), exit_rx));
        supervisor
    }

    /// Create a supervisor from the node server configuration
    pub fn from_config(config: &NodeServerConfig) -> Arc<Self> {
        Self::new(
            BridgeSpawner::from_config(config),
            config.stop_grace(),
            config.force_kill_after_grace,
        )
    }

    fn lock_state(&self) -> MutexGuard<'_, SupervisedProcess> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the bridge; a no-op if it is already running
    pub async fn start(&self) -> Result<(), BridgeError> {
        let _transition = self.transition.lock().await;

        if self.is_shut_down() {
            info!("Supervisor shut down, start ignored");
            return Ok(());
        }
        if self.is_running() {
            debug!("Bridge already running, start ignored");
            return Ok(());
        }

        self.lock_state().desired_running = true;
        if let Err(e) = self.launch() {
            // Nothing is running, so there is nothing left to restart
            self.lock_state().desired_running = false;
            return Err(e);
        }
        Ok(())
    }

    /// Stop the bridge; a no-op if it is not running
    ///
    /// Sends SIGTERM and then always waits the full grace period before
    /// releasing the handle, even if the bridge exits sooner.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        let _transition = self.transition.lock().await;
        self.stop_locked().await
    }

    /// Stop the bridge for good
    ///
    /// Later `start()` calls and unplanned exits no longer launch a process,
    /// including transitions already queued on the transition lock.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        {
            let mut state = self.lock_state();
            state.shut_down = true;
            state.desired_running = false;
        }
        let _transition = self.transition.lock().await;
        self.stop_locked().await
    }

    /// Whether `shutdown()` has been called
    pub fn is_shut_down(&self) -> bool {
        self.lock_state().shut_down
    }

    /// Caller holds `transition`
    async fn stop_locked(&self) -> Result<(), BridgeError> {
        let (generation, pid, delivery) = {
            let mut state = self.lock_state();
            // Must precede the signal, or the exit would be restarted
            state.desired_running = false;

            let Some(handle) = state.handle.as_ref() else {
                debug!("Bridge not running, stop ignored");
                return Ok(());
            };
            (
                handle.generation,
                handle.pid,
                handle.signal(TerminationSignal::Terminate),
            )
        };

        // The grace period starts once SIGTERM has actually been sent
        let delivered = match delivery {
            Some(delivery) => delivery.await.is_ok(),
            None => false,
        };
        if !delivered {
            debug!("Bridge {:?} exited before SIGTERM was delivered", pid);
        }

        info!(
            "Sent SIGTERM to bridge {:?}, waiting {:?} before releasing it",
            pid, self.stop_grace
        );
        tokio::time::sleep(self.stop_grace).await;

        let mut state = self.lock_state();
        let current = matches!(state.handle.as_ref(), Some(h) if h.generation == generation);
        if current {
            if let Some(handle) = state.handle.as_ref().filter(|h| h.is_alive()) {
                if self.force_kill_after_grace {
                    warn!(
                        "Bridge {:?} still alive after {:?}, sending SIGKILL",
                        pid, self.stop_grace
                    );
                    let _ = handle.signal(TerminationSignal::Kill);
                } else {
                    warn!(
                        "Bridge {:?} still alive after {:?}; leaving it to exit in the background",
                        pid, self.stop_grace
                    );
                }
            }
            state.handle = None;
        }

        info!("Bridge stopped");
        Ok(())
    }

    /// Whether a bridge process is currently executing
    pub fn is_running(&self) -> bool {
        self.lock_state().handle.is_some()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        if self.is_running() {
            SupervisorState::Running
        } else {
            SupervisorState::Stopped
        }
    }

    /// Whether an unplanned exit would currently be restarted
    pub fn desired_running(&self) -> bool {
        self.lock_state().desired_running
    }

    /// Process ID of the executing bridge
    pub fn pid(&self) -> Option<u32> {
        self.lock_state().handle.as_ref().and_then(|h| h.pid)
    }

    /// Number of processes launched so far (including restarts)
    pub fn launch_count(&self) -> u64 {
        self.lock_state().launches
    }

    /// Number of automatic restarts so far
    pub fn restart_count(&self) -> u64 {
        self.lock_state().restarts
    }

    /// Grace period `stop()` waits after SIGTERM
    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    /// Spawn a process and install its handle; caller holds `transition`
    fn launch(&self) -> Result<(), BridgeError> {
        let process = self.spawner.spawn()?;
        let pid = process.id();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.launches += 1;
            state.handle = Some(RunningBridge {
                generation: state.generation,
                pid,
                signal_tx,
            });
            state.generation
        };

        tokio::spawn(watch_bridge(
            process,
            generation,
            signal_rx,
            self.exit_tx.clone(),
        ));

        info!("Bridge started (pid {:?}, generation {})", pid, generation);
        Ok(())
    }

    async fn observe_exits(
        supervisor: Weak<Self>,
        mut exit_rx: mpsc::UnboundedReceiver<BridgeExit>,
    ) {
        while let Some(exit) = exit_rx.recv().await {
            let Some(supervisor) = supervisor.upgrade() else {
                break;
            };
            supervisor.on_bridge_exit(exit).await;
        }
        debug!("Bridge exit observer finished");
    }

    async fn on_bridge_exit(&self, exit: BridgeExit) {
        let should_restart = {
            let mut state = self.lock_state();
            let current =
                matches!(state.handle.as_ref(), Some(h) if h.generation == exit.generation);
            if current {
                state.handle = None;
            }
            info!(
                "Bridge process {:?} exited with {:?} (generation {}, current: {})",
                exit.pid, exit.status, exit.generation, current
            );
            current && state.desired_running
        };

        if !should_restart {
            return;
        }

        let _transition = self.transition.lock().await;
        {
            // A stop or start may have completed while we waited
            let mut state = self.lock_state();
            if state.shut_down || !state.desired_running || state.handle.is_some() {
                return;
            }
            state.restarts += 1;
            warn!(
                "Restarting bridge after unplanned exit (restart #{})",
                state.restarts
            );
        }

        if let Err(e) = self.launch() {
            error!("Failed to restart bridge: {}", e);
            self.lock_state().desired_running = false;
        }
    }
}

/// Own a running child: forward signals to it and report its exit
async fn watch_bridge(
    mut process: BridgeProcess,
    generation: u64,
    mut signal_rx: mpsc::UnboundedReceiver<SignalRequest>,
    exit_tx: mpsc::UnboundedSender<BridgeExit>,
) {
    let pid = process.id();
    let status = loop {
        tokio::select! {
            status = process.wait() => break status,
            Some(request) = signal_rx.recv() => {
                let result = match request.signal {
                    TerminationSignal::Terminate => process.terminate(),
                    TerminationSignal::Kill => process.kill(),
                };
                if let Err(e) = result {
                    warn!("Failed to deliver {:?} to bridge {:?}: {}", request.signal, pid, e);
                }
                let _ = request.delivered.send(());
            }
        }
    };
    drop(signal_rx);

    let status = match status {
        Ok(status) => Some(status),
        Err(e) => {
            warn!("Failed to wait for bridge {:?}: {}", pid, e);
            None
        }
    };

    let _ = exit_tx.send(BridgeExit {
        generation,
        pid,
        status,
    });
}
