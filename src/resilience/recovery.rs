//! Recovery scheduling.
//!
//! # Responsibilities
//! - Arm a timer when a breaker opens
//! - On expiry, move the breaker to half-open even with zero traffic
//! - Cancel the pending timer on re-arm or breaker drop
//!
//! # Design Decisions
//! - One pending timer per breaker; re-arming aborts the previous one
//! - The callback re-checks state under the breaker lock, so racing the
//!   admission check is harmless
//! - Outside a Tokio runtime nothing is spawned and recovery falls back to
//!   the admission check alone

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Owns the pending recovery timer of one breaker.
#[derive(Debug, Default)]
pub(crate) struct RecoveryScheduler {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl RecoveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` at `deadline`, replacing any pending timer.
    pub fn arm<F>(&self, service: &str, deadline: Instant, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!(
                service = %service,
                "No runtime available, recovery relies on admission checks"
            );
            return;
        };

        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        });

        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }

    /// True while a timer is armed and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RecoveryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
