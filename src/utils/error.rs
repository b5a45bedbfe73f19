//! Error handling utilities for graceful degradation
//!
//! Provides helpers for steps whose failure should be logged but must not
//! abort the surrounding operation.

use tracing::warn;

/// Execute an async operation and log errors without failing
///
/// Returns `Some(T)` on success, `None` on error (after logging).
/// Useful for non-critical async operations that should not stop execution.
///
/// # Example
/// ```rust,ignore
/// use hkisy_node::utils::log_error_async;
///
/// log_error_async(|| framework.remove_notices_all(), "Failed to clear notices").await;
/// ```
pub async fn log_error_async<F, Fut, T, E>(operation: F, context: &str) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match operation().await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {:#}", context, e);
            None
        }
    }
}
