//! Outcome observation for guarded calls.
//!
//! # Responsibilities
//! - Receive per-call outcomes, rejections and state transitions from breakers
//! - Keep per-service tallies for the status endpoint
//! - Forward everything to the metrics recorders
//!
//! # Design Decisions
//! - One observer instance is created at startup and injected into every
//!   breaker; there is no process-global registry
//! - Observers are passive: they never influence breaker decisions and must
//!   not call back into a breaker (transitions are reported under its lock)

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::observability::metrics;
use crate::resilience::{BreakerState, CallOutcome};

/// Sink for breaker activity.
pub trait OutcomeObserver: Send + Sync {
    /// A breaker for `service` was created in `state`.
    fn record_registered(&self, _service: &str, _state: BreakerState) {}

    /// A permitted call finished.
    fn record_call(&self, service: &str, outcome: &CallOutcome);

    /// A call was rejected without running.
    fn record_rejected(&self, service: &str);

    /// The breaker changed state.
    fn record_transition(&self, service: &str, from: BreakerState, to: BreakerState);
}

/// Observer that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl OutcomeObserver for NoopObserver {
    fn record_call(&self, _service: &str, _outcome: &CallOutcome) {}
    fn record_rejected(&self, _service: &str) {}
    fn record_transition(&self, _service: &str, _from: BreakerState, _to: BreakerState) {}
}

/// Most recent transition of a service's breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRecord {
    pub from: BreakerState,
    pub to: BreakerState,
    pub at: DateTime<Utc>,
}

/// Running totals for one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTally {
    pub successes: u64,
    pub failures: u64,
    pub rejected: u64,
    pub transitions: u64,
    /// Mean latency of permitted calls, in milliseconds.
    pub mean_latency_ms: f64,
    pub last_transition: Option<TransitionRecord>,
    #[serde(skip)]
    total_latency_ms: f64,
}

/// Production observer: in-memory tallies plus Prometheus recording.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    tallies: DashMap<String, ServiceTally>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally for a single service, if it has reported anything.
    pub fn tally(&self, service: &str) -> Option<ServiceTally> {
        self.tallies.get(service).map(|t| t.value().clone())
    }

    /// All tallies, ordered by service name.
    pub fn tallies(&self) -> BTreeMap<String, ServiceTally> {
        self.tallies
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl OutcomeObserver for MetricsRegistry {
    fn record_registered(&self, service: &str, state: BreakerState) {
        metrics::record_state(service, state);
        self.tallies.entry(service.to_string()).or_default();
    }

    fn record_call(&self, service: &str, outcome: &CallOutcome) {
        metrics::record_call(service, outcome.label(), outcome.duration);

        let mut tally = self.tallies.entry(service.to_string()).or_default();
        if outcome.success {
            tally.successes += 1;
        } else {
            tally.failures += 1;
        }
        tally.total_latency_ms += outcome.duration.as_secs_f64() * 1_000.0;
        tally.mean_latency_ms = tally.total_latency_ms / (tally.successes + tally.failures) as f64;
    }

    fn record_rejected(&self, service: &str) {
        metrics::record_rejected(service);
        self.tallies.entry(service.to_string()).or_default().rejected += 1;
    }

    fn record_transition(&self, service: &str, from: BreakerState, to: BreakerState) {
        metrics::record_state_change(service, from, to);

        let mut tally = self.tallies.entry(service.to_string()).or_default();
        tally.transitions += 1;
        tally.last_transition = Some(TransitionRecord {
            from,
            to,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn outcome(success: bool, millis: u64) -> CallOutcome {
        CallOutcome {
            success,
            timestamp: Instant::now(),
            duration: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_registry_tallies() {
        let registry = MetricsRegistry::new();
        registry.record_call("portfolio-service", &outcome(true, 10));
        registry.record_call("portfolio-service", &outcome(false, 30));
        registry.record_rejected("portfolio-service");
        registry.record_transition("portfolio-service", BreakerState::Closed, BreakerState::Open);

        let tally = registry.tally("portfolio-service").unwrap();
        assert_eq!((tally.successes, tally.failures, tally.rejected), (1, 1, 1));
        assert_eq!(tally.transitions, 1);
        assert!((tally.mean_latency_ms - 20.0).abs() < 1e-9);
        assert_eq!(tally.last_transition.unwrap().to, BreakerState::Open);

        assert!(registry.tally("audit-service").is_none());
        registry.record_registered("audit-service", BreakerState::Closed);
        assert_eq!(registry.tally("audit-service"), Some(ServiceTally::default()));
        assert_eq!(registry.tallies().len(), 2);
    }

    #[test]
    fn test_tally_serializes_without_internal_total() {
        let registry = MetricsRegistry::new();
        registry.record_call("audit-service", &outcome(true, 4));
        let json = serde_json::to_value(registry.tally("audit-service").unwrap()).unwrap();
        assert_eq!(json["successes"], 1);
        assert!(json.get("totalLatencyMs").is_none());
        assert!(json.get("meanLatencyMs").is_some());
    }
}
