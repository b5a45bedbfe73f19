//! Async operation helpers
//!
//! Provides utilities for common async patterns.

use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawn a unit of work in the background and log how it failed, if it did
///
/// The caller does not wait for the result. Errors are logged with their full
/// chain and panics are caught, so a failed handler never takes the service
/// down with it.
///
/// # Example
/// ```rust,ignore
/// use hkisy_node::utils::spawn_logged;
///
/// spawn_logged("config", async move { reconciler.on_config_received(&msg).await.map(|_| ()) });
/// ```
pub fn spawn_logged<F, E>(context: impl Into<String>, future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let context = context.into();
    tokio::spawn(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error with async task {}: {:#}", context, e),
            Err(panic) => error!(
                "Async task {} panicked: {}",
                context,
                panic_message(panic.as_ref())
            ),
        }
    })
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
