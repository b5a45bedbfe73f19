//! Configuration reconciliation
//!
//! Turns configuration deliveries from the framework into bridge restarts.
//! A delivery is applied only when it carries every required field and its
//! canonical form differs from the last applied snapshot; applying it means
//! persisting it first and then running a full stop/start cycle.

pub mod snapshot;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bridge::ProcessSupervisor;
use crate::config::NodeServerConfig;
use crate::framework::events::ConfigMessage;
use crate::framework::traits::Framework;
use crate::utils::log_error_async;

pub use snapshot::{
    bridge_typed_params, canonicalize, missing_required_fields, ConfigSnapshot, REQUIRED_FIELDS,
};

/// Result of handling one configuration delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Required fields were absent or null; nothing was done
    Invalid { missing: Vec<&'static str> },
    /// Identical to the applied snapshot; nothing was done
    Unchanged,
    /// Identical to the snapshot persisted by a previous run; the bridge was
    /// started without rewriting it
    Resumed,
    /// Persisted and the bridge was restarted
    Applied,
}

pub struct ConfigReconciler {
    supervisor: Arc<ProcessSupervisor>,
    framework: Arc<dyn Framework>,
    snapshot_path: PathBuf,
    doc_path: PathBuf,
    /// Held across persist and restart so deliveries apply one at a time
    snapshot: Mutex<Option<ConfigSnapshot>>,
    bootstrapped: AtomicBool,
    /// Set once a snapshot has been applied or resumed in this process
    launched: AtomicBool,
}

impl ConfigReconciler {
    /// Create a reconciler, loading any snapshot persisted by a previous run
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        framework: Arc<dyn Framework>,
        snapshot_path: PathBuf,
        doc_path: PathBuf,
    ) -> Self {
        let snapshot = match ConfigSnapshot::load(&snapshot_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to load bridge configuration, starting without one: {}", e);
                None
            }
        };

        Self {
            supervisor,
            framework,
            snapshot_path,
            doc_path,
            snapshot: Mutex::new(snapshot),
            bootstrapped: AtomicBool::new(false),
            launched: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        config: &NodeServerConfig,
        supervisor: Arc<ProcessSupervisor>,
        framework: Arc<dyn Framework>,
    ) -> Self {
        Self::new(
            supervisor,
            framework,
            config.bridge_config_path(),
            config.config_doc_path.clone(),
        )
    }

    /// Whether a snapshot has been loaded or applied
    pub async fn has_snapshot(&self) -> bool {
        self.snapshot.lock().await.is_some()
    }

    /// Handle one configuration delivery
    pub async fn on_config_received(
        &self,
        message: &ConfigMessage,
    ) -> anyhow::Result<ReconcileOutcome> {
        if message.is_initial_config {
            self.bootstrap().await;
        }
        if message.new_params_detected {
            info!("New parameters detected");
        }

        let missing = missing_required_fields(message.typed_custom_data.as_ref());
        let data = match message.typed_custom_data.as_ref() {
            Some(data) if missing.is_empty() => data,
            _ => {
                debug!("Bridge configuration incomplete, missing {:?}", missing);
                return Ok(ReconcileOutcome::Invalid { missing });
            }
        };

        let incoming = ConfigSnapshot::from_value(data)?;
        let mut applied = self.snapshot.lock().await;
        if applied.as_ref() == Some(&incoming) {
            if self.launched.load(Ordering::SeqCst) {
                debug!("Bridge configuration unchanged");
                return Ok(ReconcileOutcome::Unchanged);
            }
            info!("Bridge configuration matches the persisted one, starting bridge");
            self.supervisor.start().await?;
            self.launched.store(true, Ordering::SeqCst);
            return Ok(ReconcileOutcome::Resumed);
        }

        info!("Bridge configuration changed, restarting bridge");
        incoming.persist(&self.snapshot_path).await?;
        *applied = Some(incoming);
        self.launched.store(true, Ordering::SeqCst);

        self.supervisor.stop().await?;
        self.supervisor.start().await?;
        Ok(ReconcileOutcome::Applied)
    }

    /// First-configuration housekeeping, once per service lifetime
    async fn bootstrap(&self) {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Publishing configuration schema and documentation");

        log_error_async(
            || self.framework.remove_notices_all(),
            "Failed to remove notices",
        )
        .await;

        let params = bridge_typed_params();
        log_error_async(
            || self.framework.save_typed_params(&params),
            "Failed to publish typed parameters",
        )
        .await;

        match tokio::fs::read_to_string(&self.doc_path).await {
            Ok(doc) => {
                log_error_async(
                    || self.framework.set_custom_params_doc(&doc),
                    "Failed to publish configuration documentation",
                )
                .await;
            }
            Err(e) => warn!(
                "Failed to read configuration documentation {:?}: {}",
                self.doc_path, e
            ),
        }
    }
}
