//! Line-delimited JSON adapter over stdin/stdout
//!
//! Each inbound line is one [`FrameworkEvent`]; each outbound call is written
//! as one [`FrameworkCall`] line. A host process translates between these lines
//! and its own messaging transport.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tracing::{debug, info, warn};

use crate::error::FrameworkError;
use crate::framework::events::FrameworkEvent;
use crate::framework::traits::{Framework, FrameworkCall, NodeDefinition, TypedParam};

/// Framework adapter writing calls as JSON lines
pub struct StdioFramework<W> {
    writer: TokioMutex<W>,
    nodes: Mutex<BTreeSet<String>>,
}

impl StdioFramework<tokio::io::Stdout> {
    /// Adapter writing to the process's stdout
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> StdioFramework<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: TokioMutex::new(writer),
            nodes: Mutex::new(BTreeSet::new()),
        }
    }

    /// Record nodes the framework reported (e.g. in a config message)
    pub fn register_known_nodes<I: IntoIterator<Item = String>>(&self, nodes: I) {
        let mut known = self.lock_nodes();
        known.clear();
        known.extend(nodes);
    }

    fn lock_nodes(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.nodes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn send(&self, call: &FrameworkCall) -> Result<(), FrameworkError> {
        let mut line = serde_json::to_vec(call)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        debug!("Message Sent: {:?}", call);
        Ok(())
    }
}

#[async_trait]
impl<W> Framework for StdioFramework<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn add_notice_temp(
        &self,
        key: &str,
        text: &str,
        duration: Duration,
    ) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::AddNoticeTemp {
            key: key.to_string(),
            text: text.to_string(),
            duration_secs: duration.as_secs(),
        })
        .await
    }

    async fn remove_notices_all(&self) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::RemoveNoticesAll).await
    }

    async fn set_driver(
        &self,
        address: &str,
        driver: &str,
        value: i64,
        uom: u32,
    ) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::SetDriver {
            address: address.to_string(),
            driver: driver.to_string(),
            value,
            uom,
        })
        .await
    }

    async fn save_typed_params(&self, params: &[TypedParam]) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::SaveTypedParams {
            params: params.to_vec(),
        })
        .await
    }

    async fn set_custom_params_doc(&self, doc: &str) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::SetCustomParamsDoc {
            doc: doc.to_string(),
        })
        .await
    }

    async fn add_node(&self, node: NodeDefinition) -> Result<(), FrameworkError> {
        let address = node.address.clone();
        self.send(&FrameworkCall::AddNode { node }).await?;
        self.lock_nodes().insert(address);
        Ok(())
    }

    async fn delete_node(&self, address: &str) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::DelNode {
            address: address.to_string(),
        })
        .await?;
        self.lock_nodes().remove(address);
        Ok(())
    }

    async fn has_node(&self, address: &str) -> bool {
        self.lock_nodes().contains(address)
    }

    async fn sync_nodes(&self, nodes: &[String]) {
        self.register_known_nodes(nodes.iter().cloned());
    }

    async fn stop(&self) -> Result<(), FrameworkError> {
        self.send(&FrameworkCall::Stop).await
    }
}

/// Read events line by line and forward them until the input or the receiver closes
pub async fn read_events<R>(reader: R, events: mpsc::Sender<FrameworkEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Framework input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read framework input: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<FrameworkEvent>(&line) {
            Ok(event) => {
                // Config messages carry credentials
                if !matches!(event, FrameworkEvent::Config(_)) {
                    debug!("Message Received: {:?}", event);
                }
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed framework message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::events::NodeCommand;

    #[tokio::test]
    async fn test_calls_are_written_as_json_lines() {
        let framework = StdioFramework::new(Vec::new());
        framework.set_driver("hk001", "GV0", 1, 25).await.unwrap();
        framework.stop().await.unwrap();

        let written = String::from_utf8(framework.writer.lock().await.clone()).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["call"], "setDriver");
        assert_eq!(lines[0]["value"], 1);
        assert_eq!(lines[1]["call"], "stop");
    }

    #[tokio::test]
    async fn test_node_registry_follows_add_and_delete() {
        let framework = StdioFramework::new(Vec::new());
        framework.register_known_nodes(vec!["controller".to_string()]);
        assert!(framework.has_node("controller").await);

        framework.delete_node("controller").await.unwrap();
        assert!(!framework.has_node("controller").await);
    }

    #[tokio::test]
    async fn test_read_events_skips_malformed_lines() {
        let input: &[u8] =
            b"{\"event\":\"poll\"}\nnot json\n\n{\"event\":\"command\",\"address\":\"hk001\",\"command\":\"QUERY\"}\n";
        let (tx, mut rx) = mpsc::channel(8);
        read_events(tokio::io::BufReader::new(input), tx).await;

        assert_eq!(rx.recv().await, Some(FrameworkEvent::Poll { long_poll: false }));
        assert_eq!(
            rx.recv().await,
            Some(FrameworkEvent::Command {
                address: "hk001".to_string(),
                command: NodeCommand::Query
            })
        );
        assert_eq!(rx.recv().await, None);
    }
}
