//! Breaker state machine.
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_threshold, or
//!                requests >= minimum_requests and failures/requests >= failure_rate_threshold
//! Open → HalfOpen: open_timeout elapsed since the last failure
//!                  (recovery timer or the next admission check)
//! HalfOpen → Closed: successes >= success_threshold
//! HalfOpen → Open: any probe fails
//! ```
//!
//! `Window` holds no lock of its own; the breaker keeps it behind a mutex
//! and every method here runs with that mutex held.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::resilience::types::{BreakerSnapshot, BreakerState};

/// A state change produced by the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
    /// Generation of the window after the transition.
    pub generation: u64,
}

/// Result of asking the window for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Granted {
        generation: u64,
        /// True if the call occupies a half-open probe slot.
        probe: bool,
        /// OPEN → HALF_OPEN performed on the way in.
        transition: Option<Transition>,
    },
    Rejected,
}

/// Counters and timestamps for the current state window.
#[derive(Debug)]
pub(crate) struct Window {
    state: BreakerState,
    /// Bumped on every transition; outcomes and timers from an older
    /// generation are ignored.
    generation: u64,
    requests: u32,
    failures: u32,
    successes: u32,
    half_open_requests: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    last_state_change_at: DateTime<Utc>,
}

impl Window {
    pub fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            generation: 0,
            requests: 0,
            failures: 0,
            successes: 0,
            half_open_requests: 0,
            last_failure: None,
            last_failure_at: None,
            last_state_change_at: Utc::now(),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Decide whether a call may proceed.
    pub fn admit(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        let mut transition = None;

        if self.state == BreakerState::Open {
            let elapsed = self
                .last_failure
                .map_or(true, |at| now.saturating_duration_since(at) >= config.open_timeout());
            if !elapsed {
                return Admission::Rejected;
            }
            transition = Some(self.transition(BreakerState::HalfOpen));
        }

        match self.state {
            BreakerState::Closed => Admission::Granted {
                generation: self.generation,
                probe: false,
                transition,
            },
            BreakerState::HalfOpen if self.half_open_requests < config.max_half_open_requests => {
                self.half_open_requests += 1;
                Admission::Granted {
                    generation: self.generation,
                    probe: true,
                    transition,
                }
            }
            _ => Admission::Rejected,
        }
    }

    /// Apply a successful outcome admitted under `generation`.
    pub fn on_success(&mut self, config: &CircuitBreakerConfig, generation: u64) -> Option<Transition> {
        if generation != self.generation {
            return None;
        }

        match self.state {
            BreakerState::Closed => {
                self.reset_counters();
                None
            }
            BreakerState::HalfOpen => {
                // the probe slot was taken at admission
                self.successes += 1;
                if self.successes >= config.success_threshold {
                    Some(self.transition(BreakerState::Closed))
                } else {
                    None
                }
            }
            BreakerState::Open => None,
        }
    }

    /// Apply a failed outcome admitted under `generation`.
    pub fn on_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        generation: u64,
        now: Instant,
    ) -> Option<Transition> {
        if generation != self.generation {
            return None;
        }

        self.failures += 1;
        self.requests += 1;
        self.last_failure = Some(now);
        self.last_failure_at = Some(Utc::now());

        match self.state {
            BreakerState::Closed if self.should_open(config) => {
                Some(self.transition(BreakerState::Open))
            }
            BreakerState::HalfOpen => Some(self.transition(BreakerState::Open)),
            _ => None,
        }
    }

    /// Give back a probe slot whose call never reported an outcome.
    pub fn release(&mut self, generation: u64) {
        if generation == self.generation && self.state == BreakerState::HalfOpen {
            self.half_open_requests = self.half_open_requests.saturating_sub(1);
        }
    }

    /// Recovery timer path: OPEN → HALF_OPEN if nothing moved the breaker
    /// since the timer was armed.
    pub fn recover(&mut self, armed_generation: u64) -> Option<Transition> {
        if self.state == BreakerState::Open && self.generation == armed_generation {
            Some(self.transition(BreakerState::HalfOpen))
        } else {
            None
        }
    }

    fn should_open(&self, config: &CircuitBreakerConfig) -> bool {
        if self.failures >= config.failure_threshold {
            return true;
        }

        if self.requests >= config.minimum_requests && self.requests > 0 {
            let failure_rate = self.failures as f64 / self.requests as f64;
            return failure_rate >= config.failure_rate_threshold;
        }

        false
    }

    fn transition(&mut self, to: BreakerState) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.last_state_change_at = Utc::now();

        match to {
            BreakerState::HalfOpen => {
                self.half_open_requests = 0;
                self.successes = 0;
            }
            BreakerState::Closed => self.reset_counters(),
            BreakerState::Open => {}
        }

        Transition {
            from,
            to,
            generation: self.generation,
        }
    }

    fn reset_counters(&mut self) {
        self.requests = 0;
        self.failures = 0;
        self.successes = 0;
        self.half_open_requests = 0;
    }

    pub fn snapshot(&self, name: &str) -> BreakerSnapshot {
        BreakerSnapshot {
            name: name.to_string(),
            state: self.state,
            failures: self.failures,
            requests: self.requests,
            successes: self.successes,
            half_open_requests: self.half_open_requests,
            last_state_change: self.last_state_change_at,
            last_failure_time: self.last_failure_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(failure_threshold: u32, minimum_requests: u32, rate: f64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_half_open_requests: 3,
            open_timeout_ms: 1_000,
            failure_threshold,
            success_threshold: 2,
            failure_rate_threshold: rate,
            minimum_requests,
        }
    }

    fn granted(admission: Admission) -> u64 {
        match admission {
            Admission::Granted { generation, .. } => generation,
            Admission::Rejected => panic!("expected admission"),
        }
    }

    fn fail(window: &mut Window, cfg: &CircuitBreakerConfig, now: Instant) -> Option<Transition> {
        let generation = granted(window.admit(cfg, now));
        window.on_failure(cfg, generation, now)
    }

    fn succeed(window: &mut Window, cfg: &CircuitBreakerConfig, now: Instant) -> Option<Transition> {
        let generation = granted(window.admit(cfg, now));
        window.on_success(cfg, generation)
    }

    /// Reference model of the closed-state trip rule.
    fn model_trips(outcomes: &[bool], cfg: &CircuitBreakerConfig) -> Option<usize> {
        let (mut failures, mut requests) = (0u32, 0u32);
        for (i, ok) in outcomes.iter().enumerate() {
            if *ok {
                failures = 0;
                requests = 0;
                continue;
            }
            failures += 1;
            requests += 1;
            let by_count = failures >= cfg.failure_threshold;
            let by_rate = requests >= cfg.minimum_requests
                && failures as f64 / requests as f64 >= cfg.failure_rate_threshold;
            if by_count || by_rate {
                return Some(i);
            }
        }
        None
    }

    #[test]
    fn test_closed_trip_matches_model() {
        let cfgs = [config(3, 100, 0.9), config(5, 2, 0.5), config(10, 4, 1.0), config(1, 1, 0.0)];
        // deterministic pseudo-random outcome sequences
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for cfg in &cfgs {
            for _ in 0..200 {
                let outcomes: Vec<bool> = (0..24)
                    .map(|_| {
                        seed ^= seed << 13;
                        seed ^= seed >> 7;
                        seed ^= seed << 17;
                        seed % 3 == 0
                    })
                    .collect();

                let now = Instant::now();
                let mut window = Window::new();
                let mut tripped_at = None;
                for (i, ok) in outcomes.iter().enumerate() {
                    let t = if *ok {
                        succeed(&mut window, cfg, now)
                    } else {
                        fail(&mut window, cfg, now)
                    };
                    if t.is_some() {
                        tripped_at = Some(i);
                        break;
                    }
                }
                assert_eq!(tripped_at, model_trips(&outcomes, cfg), "outcomes: {:?}", outcomes);
            }
        }
    }

    #[test]
    fn test_success_resets_closed_window() {
        let cfg = config(5, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        fail(&mut window, &cfg, now);
        fail(&mut window, &cfg, now);
        assert_eq!(window.snapshot("svc").failures, 2);

        succeed(&mut window, &cfg, now);
        let snap = window.snapshot("svc");
        assert_eq!((snap.failures, snap.requests), (0, 0));
        assert_eq!(snap.state, BreakerState::Closed);
    }

    #[test]
    fn test_open_rejects_until_timeout() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        let t = fail(&mut window, &cfg, now).unwrap();
        assert_eq!((t.from, t.to), (BreakerState::Closed, BreakerState::Open));

        assert_eq!(window.admit(&cfg, now + Duration::from_millis(999)), Admission::Rejected);

        match window.admit(&cfg, now + Duration::from_millis(1_000)) {
            Admission::Granted { probe, transition, .. } => {
                assert!(probe);
                let t = transition.unwrap();
                assert_eq!((t.from, t.to), (BreakerState::Open, BreakerState::HalfOpen));
            }
            Admission::Rejected => panic!("expected probe"),
        }
        assert_eq!(window.snapshot("svc").half_open_requests, 1);
    }

    #[test]
    fn test_half_open_limits_probes() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        fail(&mut window, &cfg, now);
        let later = now + Duration::from_secs(1);

        for _ in 0..3 {
            assert!(matches!(window.admit(&cfg, later), Admission::Granted { probe: true, .. }));
        }
        assert_eq!(window.admit(&cfg, later), Admission::Rejected);
    }

    #[test]
    fn test_half_open_closes_after_successes() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        fail(&mut window, &cfg, now);
        let later = now + Duration::from_secs(1);

        assert!(succeed(&mut window, &cfg, later).is_none());
        assert_eq!(window.state(), BreakerState::HalfOpen);
        let t = succeed(&mut window, &cfg, later).unwrap();
        assert_eq!(t.to, BreakerState::Closed);

        let snap = window.snapshot("svc");
        assert_eq!(
            (snap.failures, snap.requests, snap.successes, snap.half_open_requests),
            (0, 0, 0, 0)
        );
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        fail(&mut window, &cfg, now);

        let later = now + Duration::from_secs(2);
        succeed(&mut window, &cfg, later);
        let t = fail(&mut window, &cfg, later).unwrap();
        assert_eq!((t.from, t.to), (BreakerState::HalfOpen, BreakerState::Open));
        assert_eq!(window.last_failure(), Some(later));
        assert_eq!(window.admit(&cfg, later), Admission::Rejected);
    }

    #[test]
    fn test_stale_outcomes_are_ignored() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();

        let slow = granted(window.admit(&cfg, now));
        fail(&mut window, &cfg, now);
        assert_eq!(window.state(), BreakerState::Open);

        // a call admitted before the trip reports afterwards
        assert!(window.on_failure(&cfg, slow, now + Duration::from_millis(500)).is_none());
        assert_eq!(window.last_failure(), Some(now));
        assert_eq!(window.snapshot("svc").failures, 1);
    }

    #[test]
    fn test_recover_is_idempotent() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        let trip = fail(&mut window, &cfg, now).unwrap();

        // admission check wins the race
        assert!(matches!(
            window.admit(&cfg, now + Duration::from_secs(1)),
            Admission::Granted { transition: Some(_), .. }
        ));
        // the timer armed at the trip finds the window already moved on
        assert!(window.recover(trip.generation).is_none());
        assert_eq!(window.state(), BreakerState::HalfOpen);
        assert_eq!(window.snapshot("svc").half_open_requests, 1);
    }

    #[test]
    fn test_release_returns_probe_slot() {
        let cfg = config(1, 100, 0.9);
        let now = Instant::now();
        let mut window = Window::new();
        let trip = fail(&mut window, &cfg, now).unwrap();
        window.recover(trip.generation).unwrap();

        let generation = granted(window.admit(&cfg, now));
        assert_eq!(window.snapshot("svc").half_open_requests, 1);
        window.release(generation);
        assert_eq!(window.snapshot("svc").half_open_requests, 0);
    }
}
