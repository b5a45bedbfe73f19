//! Lock utilities for async contexts

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Try to acquire a lock with a timeout
///
/// Returns the guard if the lock was acquired within `timeout`, `None`
/// otherwise. The caller is not queued after a timeout.
pub async fn try_lock_timeout<T>(mutex: &Mutex<T>, timeout: Duration) -> Option<MutexGuard<'_, T>> {
    tokio::time::timeout(timeout, mutex.lock()).await.ok()
}
