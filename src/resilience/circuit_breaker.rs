//! Circuit breaker for downstream dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a bounded number of probes test whether it recovered
//!
//! # Concurrency
//! ```text
//! execute()
//!     → acquire()         lock window, admit or reject, maybe OPEN → HALF_OPEN
//!     → operation().await no lock held
//!     → Permit::success() / failure()
//!                         lock window, update counters, maybe transition
//!
//! recovery timer          lock window, OPEN → HALF_OPEN if still in the
//!                         generation that armed it
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global), owned for the caller's lifetime
//! - Every multi-field update happens under one mutex; the state is mirrored
//!   into an atomic so `current_state()` never blocks
//! - Probe slots are taken at admission, so concurrent probes never exceed
//!   `max_half_open_requests`; a dropped call gives its slot back
//! - Rejected and cancelled calls never touch the counters

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::CircuitBreakerConfig;
use crate::observability::OutcomeObserver;
use crate::resilience::recovery::RecoveryScheduler;
use crate::resilience::state::{Admission, Transition, Window};
use crate::resilience::types::{
    BreakerConfigError, BreakerSnapshot, BreakerState, CallError, CallOutcome,
    validate_breaker_config,
};

/// Guards calls to one downstream dependency.
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    config: CircuitBreakerConfig,
    /// Mirror of `window.state`, written only under the window lock.
    state: AtomicU8,
    window: Mutex<Window>,
    observer: Arc<dyn OutcomeObserver>,
    recovery: RecoveryScheduler,
}

impl Shared {
    /// Publish a transition. Caller holds the window lock.
    fn publish(self: &Arc<Self>, window: &Window, transition: Transition) {
        self.state.store(transition.to as u8, Ordering::Release);

        if transition.to == BreakerState::Open {
            tracing::warn!(
                service = %self.name,
                from = %transition.from,
                to = %transition.to,
                "Circuit breaker opened"
            );
        } else {
            tracing::info!(
                service = %self.name,
                from = %transition.from,
                to = %transition.to,
                "Circuit breaker state changed"
            );
        }
        self.observer
            .record_transition(&self.name, transition.from, transition.to);

        if transition.to == BreakerState::Open {
            let opened_at = window.last_failure().unwrap_or_else(Instant::now);
            let deadline = opened_at + self.config.open_timeout();
            let shared = Arc::downgrade(self);
            let generation = transition.generation;
            self.recovery.arm(&self.name, deadline, move || {
                if let Some(shared) = shared.upgrade() {
                    shared.recover(generation);
                }
            });
        }
    }

    fn recover(self: &Arc<Self>, armed_generation: u64) {
        let mut window = self.window.lock();
        if let Some(transition) = window.recover(armed_generation) {
            self.publish(&window, transition);
        }
    }
}

impl CircuitBreaker {
    /// Create a breaker for `name`, reporting to `observer`.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        observer: Arc<dyn OutcomeObserver>,
    ) -> Result<Self, BreakerConfigError> {
        validate_breaker_config(&config)?;

        let name = name.into();
        observer.record_registered(&name, BreakerState::Closed);

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                config,
                state: AtomicU8::new(BreakerState::Closed as u8),
                window: Mutex::new(Window::new()),
                observer,
                recovery: RecoveryScheduler::new(),
            }),
        })
    }

    /// The dependency this breaker guards.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// Current state, without taking the lock.
    pub fn current_state(&self) -> BreakerState {
        BreakerState::from(self.shared.state.load(Ordering::Acquire))
    }

    /// Consistent view of state, counters and timestamps.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.shared.window.lock().snapshot(&self.shared.name)
    }

    /// Ask for permission to make one call.
    ///
    /// Returns `None` (and records a rejection) if the breaker is open or
    /// all half-open probe slots are taken. The returned permit must be
    /// resolved with [`Permit::success`] or [`Permit::failure`].
    pub fn acquire(&self) -> Option<Permit<'_>> {
        let now = Instant::now();
        let admission = {
            let mut window = self.shared.window.lock();
            let admission = window.admit(&self.shared.config, now);
            if let Admission::Granted {
                transition: Some(transition),
                ..
            } = admission
            {
                self.shared.publish(&window, transition);
            }
            admission
        };

        match admission {
            Admission::Granted {
                generation, probe, ..
            } => Some(Permit {
                shared: &self.shared,
                generation,
                probe,
                started: now,
                reported: false,
            }),
            Admission::Rejected => {
                tracing::debug!(service = %self.shared.name, "Call rejected, circuit open");
                self.shared.observer.record_rejected(&self.shared.name);
                None
            }
        }
    }

    /// Run `operation` under breaker protection.
    ///
    /// Any `Err` from the operation counts as a failure and is returned
    /// unchanged inside [`CallError::Operation`].
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(None, operation).await
    }

    /// Like [`execute`](Self::execute), but returns [`CallError::Cancelled`]
    /// without touching the breaker if `cancel` fired before admission.
    pub async fn execute_with_cancel<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(Some(cancel), operation).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        cancel: Option<&CancellationToken>,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(service = %self.shared.name, "Call cancelled before admission");
            return Err(CallError::Cancelled {
                service: self.shared.name.clone(),
            });
        }

        let Some(permit) = self.acquire() else {
            return Err(CallError::CircuitOpen {
                service: self.shared.name.clone(),
            });
        };

        match operation().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(CallError::Operation(e))
            }
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        self.shared.recovery.cancel();
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &self.current_state())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Permission for one call, obtained from [`CircuitBreaker::acquire`].
///
/// Dropping an unresolved permit gives a half-open probe slot back without
/// recording an outcome.
#[must_use = "resolve the permit with success() or failure()"]
pub struct Permit<'a> {
    shared: &'a Arc<Shared>,
    generation: u64,
    probe: bool,
    started: Instant,
    reported: bool,
}

impl Permit<'_> {
    /// True if this call is a half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(self) {
        self.report(true);
    }

    pub fn failure(self) {
        self.report(false);
    }

    fn report(mut self, success: bool) {
        self.reported = true;
        let now = Instant::now();
        let outcome = CallOutcome {
            success,
            timestamp: now,
            duration: now.saturating_duration_since(self.started),
        };

        {
            let config = &self.shared.config;
            let mut window = self.shared.window.lock();
            let transition = if success {
                window.on_success(config, self.generation)
            } else {
                window.on_failure(config, self.generation, now)
            };
            if let Some(transition) = transition {
                self.shared.publish(&window, transition);
            }
        }

        tracing::debug!(
            service = %self.shared.name,
            result = outcome.label(),
            duration_ms = outcome.duration.as_millis() as u64,
            "Guarded call finished"
        );
        self.shared.observer.record_call(&self.shared.name, &outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.reported && self.probe {
            self.shared.window.lock().release(self.generation);
        }
    }
}
