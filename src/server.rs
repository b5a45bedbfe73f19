//! Node server: dispatches framework events to the bridge components
//!
//! Configuration, poll and command events are handled on spawned tasks, so a
//! slow restart never blocks the event loop and handlers may interleave.
//! Stop and delete are handled inline and end the event loop.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::ProcessSupervisor;
use crate::config::NodeServerConfig;
use crate::framework::events::{ConfigMessage, FrameworkEvent, NodeCommand};
use crate::framework::traits::Framework;
use crate::node::{ControllerNode, StatusBridge};
use crate::poll::{PollGate, PollKind, PollOutcome};
use crate::reconciler::ConfigReconciler;
use crate::utils::{log_error_async, spawn_logged, ShutdownSignal};

/// What the event loop did with one event
#[derive(Debug)]
pub enum Dispatch {
    /// Handling continues on a background task
    Spawned(JoinHandle<()>),
    /// Handled inline
    Handled,
    /// The node server has shut down; no further events are processed
    Shutdown,
}

/// Owns every component of the node server
pub struct NodeServer {
    config: NodeServerConfig,
    framework: Arc<dyn Framework>,
    supervisor: Arc<ProcessSupervisor>,
    reconciler: ConfigReconciler,
    poll_gate: PollGate,
    status: Arc<StatusBridge>,
    controller: ControllerNode,
}

impl NodeServer {
    /// Build the node server
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: NodeServerConfig,
        framework: Arc<dyn Framework>,
    ) -> anyhow::Result<Arc<Self>> {
        config.validate()?;

        let supervisor = ProcessSupervisor::from_config(&config);
        let reconciler =
            ConfigReconciler::from_config(&config, supervisor.clone(), framework.clone());
        let poll_gate = PollGate::from_config(&config);
        let status = Arc::new(StatusBridge::new(
            supervisor.clone(),
            framework.clone(),
            config.status_node_address.clone(),
        ));
        let controller = ControllerNode::new(&config, framework.clone(), status.clone());

        info!(
            "Node server initialized (bridge {:?})",
            config.bridge_binary_path()
        );

        Ok(Arc::new(Self {
            config,
            framework,
            supervisor,
            reconciler,
            poll_gate,
            status,
            controller,
        }))
    }

    pub fn config(&self) -> &NodeServerConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn reconciler(&self) -> &ConfigReconciler {
        &self.reconciler
    }

    pub fn poll_gate(&self) -> &PollGate {
        &self.poll_gate
    }

    pub fn status(&self) -> &Arc<StatusBridge> {
        &self.status
    }

    pub fn controller(&self) -> &ControllerNode {
        &self.controller
    }

    /// Route one framework event
    pub async fn dispatch(self: &Arc<Self>, event: FrameworkEvent) -> Dispatch {
        match event {
            FrameworkEvent::Connected => {
                info!("Framework connection started");
                Dispatch::Handled
            }
            FrameworkEvent::Config(message) => {
                let server = Arc::clone(self);
                Dispatch::Spawned(spawn_logged("config", async move {
                    server.handle_config(message).await
                }))
            }
            FrameworkEvent::Poll { long_poll } => {
                let server = Arc::clone(self);
                Dispatch::Spawned(spawn_logged("poll", async move {
                    server.poll(PollKind::from_long_poll(long_poll)).await;
                    anyhow::Ok(())
                }))
            }
            FrameworkEvent::Command { address, command } => {
                let server = Arc::clone(self);
                let context = format!("command {:?} on {}", command, address);
                Dispatch::Spawned(spawn_logged(context, async move {
                    server.handle_command(&address, command).await
                }))
            }
            FrameworkEvent::Stop => {
                info!("Graceful stop");
                self.poll(PollKind::Short).await;
                self.poll(PollKind::Long).await;
                self.shutdown().await;
                Dispatch::Shutdown
            }
            FrameworkEvent::Delete => {
                info!("Node server is being deleted");
                self.shutdown().await;
                Dispatch::Shutdown
            }
            FrameworkEvent::ConnectionEnded => {
                info!("Framework connection ended");
                Dispatch::Handled
            }
        }
    }

    async fn handle_config(self: &Arc<Self>, message: ConfigMessage) -> anyhow::Result<()> {
        info!("Config received has {} nodes", message.nodes.len());
        self.framework.sync_nodes(&message.nodes).await;

        if message.is_initial_config && message.nodes.is_empty() {
            // Not awaited; the bridge start must not wait on add_node
            let server = Arc::clone(self);
            spawn_logged("auto-creating controller node", async move {
                server.controller.auto_create().await
            });
        }

        let outcome = self.reconciler.on_config_received(&message).await?;
        debug!("Configuration handled: {:?}", outcome);
        Ok(())
    }

    async fn handle_command(&self, address: &str, command: NodeCommand) -> anyhow::Result<()> {
        if address == self.status.address() {
            match command {
                NodeCommand::Start => {
                    self.status.handle_start_command().await?;
                }
                NodeCommand::Stop => {
                    self.status.handle_stop_command().await?;
                }
                NodeCommand::Query => {
                    self.status.handle_query().await?;
                }
                NodeCommand::Discover => {
                    warn!("Status node does not handle {:?}", command);
                }
            }
            Ok(())
        } else if address == self.controller.address() {
            self.controller.handle_command(command).await
        } else {
            warn!("Command {:?} for unknown node {}", command, address);
            Ok(())
        }
    }

    /// Run one poll cycle through the poll gate
    pub async fn poll(&self, kind: PollKind) -> PollOutcome {
        self.poll_gate
            .run_exclusive(kind, |kind| async move {
                info!("{}", kind);
                if self.framework.has_node(self.status.address()).await {
                    self.status.publish().await?;
                }
                Ok::<(), crate::error::FrameworkError>(())
            })
            .await
    }

    /// Stop the bridge for good, then the framework interface
    ///
    /// A configuration restart still in flight cannot relaunch the bridge
    /// afterwards.
    pub async fn shutdown(&self) {
        log_error_async(
            || self.status.handle_delete_or_shutdown(),
            "Failed to stop bridge",
        )
        .await;
        log_error_async(|| self.framework.stop(), "Failed to stop framework interface").await;
    }

    /// Process events until the framework shuts the node server down, the
    /// event source closes, or `shutdown_signal` completes
    ///
    /// The bridge is stopped in every case.
    pub async fn run<S>(
        self: Arc<Self>,
        mut events: mpsc::Receiver<FrameworkEvent>,
        shutdown_signal: S,
    ) where
        S: Future<Output = ShutdownSignal>,
    {
        tokio::pin!(shutdown_signal);

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Framework event stream closed, stopping bridge");
                        self.shutdown().await;
                        break;
                    };
                    debug!("Dispatching {} event", event.name());
                    if let Dispatch::Shutdown = self.dispatch(event).await {
                        break;
                    }
                }
                signal = &mut shutdown_signal => {
                    info!("Received {}, stopping bridge", signal);
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Node server stopped");
    }
}
