//! Poll cycle gate
//!
//! The framework fires short and long poll ticks on its own timers. The gate
//! makes sure at most one poll body runs at a time: a tick that cannot get the
//! token within the bounded wait is abandoned (logged, never queued).

use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::config::NodeServerConfig;
use crate::utils::{panic_message, try_lock_timeout};

/// Which framework timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Short,
    Long,
}

impl PollKind {
    pub fn from_long_poll(long_poll: bool) -> Self {
        if long_poll {
            PollKind::Long
        } else {
            PollKind::Short
        }
    }
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollKind::Short => write!(f, "Short poll"),
            PollKind::Long => write!(f, "Long poll"),
        }
    }
}

/// How a poll cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The body ran to completion
    Completed,
    /// The body returned an error or panicked; the token was still released
    Failed(String),
    /// The token was not acquired in time; the body never ran
    Abandoned,
}

/// Serializes poll-triggered work
pub struct PollGate {
    token: Mutex<()>,
    wait: Duration,
}

impl PollGate {
    /// Create a new poll gate with the given acquisition bound
    pub fn new(wait: Duration) -> Self {
        Self {
            token: Mutex::new(()),
            wait,
        }
    }

    pub fn from_config(config: &NodeServerConfig) -> Self {
        Self::new(config.poll_lock_timeout())
    }

    /// Whether a poll body is currently running
    pub fn is_busy(&self) -> bool {
        self.token.try_lock().is_err()
    }

    /// Run `work` while holding the poll token
    ///
    /// Errors and panics from `work` are logged and reported in the outcome;
    /// they never propagate to the caller.
    pub async fn run_exclusive<F, Fut, E>(&self, kind: PollKind, work: F) -> PollOutcome
    where
        F: FnOnce(PollKind) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let Some(_token) = try_lock_timeout(&self.token, self.wait).await else {
            error!(
                "Error while polling: {} abandoned, previous poll still running after {:?}",
                kind, self.wait
            );
            return PollOutcome::Abandoned;
        };

        debug!("{} acquired poll token", kind);
        let body = async move { work(kind).await };
        match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(())) => PollOutcome::Completed,
            Ok(Err(e)) => {
                error!("Error while polling ({}): {}", kind, e);
                PollOutcome::Failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Poll body panicked ({}): {}", kind, message);
                PollOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_cycle_receives_kind() {
        let gate = PollGate::new(Duration::from_millis(500));
        let mut seen = None;
        let outcome = gate
            .run_exclusive(PollKind::Long, |kind| {
                seen = Some(kind);
                async { Ok::<(), String>(()) }
            })
            .await;
        assert_eq!(outcome, PollOutcome::Completed);
        assert_eq!(seen, Some(PollKind::Long));
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_token_released() {
        let gate = PollGate::new(Duration::from_millis(100));
        let outcome = gate
            .run_exclusive(PollKind::Short, |_| async { Err::<(), _>("isy unreachable") })
            .await;
        assert_eq!(outcome, PollOutcome::Failed("isy unreachable".to_string()));

        let next = gate
            .run_exclusive(PollKind::Short, |_| async { Ok::<(), String>(()) })
            .await;
        assert_eq!(next, PollOutcome::Completed);
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_token_released() {
        let gate = PollGate::new(Duration::from_millis(100));
        let outcome = gate
            .run_exclusive(PollKind::Short, |_| async {
                if true {
                    panic!("poll exploded");
                }
                Ok::<(), String>(())
            })
            .await;
        assert_eq!(outcome, PollOutcome::Failed("poll exploded".to_string()));
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(PollKind::from_long_poll(true), PollKind::Long);
        assert_eq!(PollKind::Short.to_string(), "Short poll");
        assert_eq!(PollKind::Long.to_string(), "Long poll");
    }
}
