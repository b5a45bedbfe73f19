//! In-process framework that records every call
//!
//! Used when the node server is embedded without a real framework, and by the
//! test suites to observe what the node server published.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::FrameworkError;
use crate::framework::traits::{Framework, FrameworkCall, NodeDefinition, TypedParam};

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<FrameworkCall>,
    nodes: BTreeSet<String>,
}

/// Framework that keeps its node registry in memory and records calls
#[derive(Debug, Default)]
pub struct RecordingFramework {
    recorded: Mutex<Recorded>,
    fail_add_node: AtomicBool,
    add_node_delay: Mutex<Duration>,
}

impl RecordingFramework {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register nodes, as if they survived a previous run
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let framework = Self::new();
        framework
            .lock()
            .nodes
            .extend(nodes.into_iter().map(Into::into));
        framework
    }

    /// Make subsequent `add_node` calls fail
    pub fn fail_add_node(&self, fail: bool) {
        self.fail_add_node.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `add_node` calls take `delay` before answering
    pub fn delay_add_node(&self, delay: Duration) {
        *self
            .add_node_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: FrameworkCall) {
        self.lock().calls.push(call);
    }

    /// Every call made so far, oldest first
    pub fn calls(&self) -> Vec<FrameworkCall> {
        self.lock().calls.clone()
    }

    /// Values published for one driver on one node, oldest first
    pub fn driver_values(&self, address: &str, driver: &str) -> Vec<i64> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                FrameworkCall::SetDriver {
                    address: a,
                    driver: d,
                    value,
                    ..
                } if a == address && d == driver => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Keys of the temporary notices shown so far
    pub fn notice_keys(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                FrameworkCall::AddNoticeTemp { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&FrameworkCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Registered node addresses
    pub fn nodes(&self) -> Vec<String> {
        self.lock().nodes.iter().cloned().collect()
    }
}

#[async_trait]
impl Framework for RecordingFramework {
    async fn add_notice_temp(
        &self,
        key: &str,
        text: &str,
        duration: Duration,
    ) -> Result<(), FrameworkError> {
        self.record(FrameworkCall::AddNoticeTemp {
            key: key.to_string(),
            text: text.to_string(),
            duration_secs: duration.as_secs(),
        });
        Ok(())
    }

    async fn remove_notices_all(&self) -> Result<(), FrameworkError> {
        self.record(FrameworkCall::RemoveNoticesAll);
        Ok(())
    }

    async fn set_driver(
        &self,
        address: &str,
        driver: &str,
        value: i64,
        uom: u32,
    ) -> Result<(), FrameworkError> {
        self.record(FrameworkCall::SetDriver {
            address: address.to_string(),
            driver: driver.to_string(),
            value,
            uom,
        });
        Ok(())
    }

    async fn save_typed_params(&self, params: &[TypedParam]) -> Result<(), FrameworkError> {
        self.record(FrameworkCall::SaveTypedParams {
            params: params.to_vec(),
        });
        Ok(())
    }

    async fn set_custom_params_doc(&self, doc: &str) -> Result<(), FrameworkError> {
        self.record(FrameworkCall::SetCustomParamsDoc {
            doc: doc.to_string(),
        });
        Ok(())
    }

    async fn add_node(&self, node: NodeDefinition) -> Result<(), FrameworkError> {
        let delay = *self
            .add_node_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_add_node.load(Ordering::SeqCst) {
            return Err(FrameworkError::Transport(format!(
                "add node {} rejected",
                node.address
            )));
        }
        let mut recorded = self.lock();
        if !recorded.nodes.insert(node.address.clone()) {
            return Err(FrameworkError::NodeExists(node.address));
        }
        recorded.calls.push(FrameworkCall::AddNode { node });
        Ok(())
    }

    async fn delete_node(&self, address: &str) -> Result<(), FrameworkError> {
        let mut recorded = self.lock();
        if !recorded.nodes.remove(address) {
            return Err(FrameworkError::NodeNotFound(address.to_string()));
        }
        recorded.calls.push(FrameworkCall::DelNode {
            address: address.to_string(),
        });
        Ok(())
    }

    async fn has_node(&self, address: &str) -> bool {
        self.lock().nodes.contains(address)
    }

    async fn stop(&self) -> Result<(), FrameworkError> {
        self.record(FrameworkCall::Stop);
        Ok(())
    }
}
