//! Breaker states, snapshots and error definitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Calls pass through; failures are tallied.
    Closed = 0,
    /// Calls fail fast until the open timeout elapses.
    Open = 1,
    /// A limited number of probes test the dependency.
    HalfOpen = 2,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl From<u8> for BreakerState {
    fn from(val: u8) -> Self {
        match val {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one permitted call, handed to the state machine and observer.
#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
    pub success: bool,
    /// When the outcome was reported.
    pub timestamp: Instant,
    /// Time between admission and report.
    pub duration: Duration,
}

impl CallOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        if self.success { "success" } else { "failure" }
    }
}

/// Read-only view of a breaker for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failures: u32,
    pub requests: u32,
    pub successes: u32,
    pub half_open_requests: u32,
    pub last_state_change: DateTime<Utc>,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Invalid breaker tuning, detected at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BreakerConfigError {
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("success_threshold must be at least 1")]
    ZeroSuccessThreshold,

    #[error("max_half_open_requests must be at least 1")]
    ZeroHalfOpenRequests,

    #[error("open_timeout_ms must be greater than zero")]
    ZeroOpenTimeout,

    #[error("failure_rate_threshold {0} is outside [0.0, 1.0]")]
    FailureRateOutOfRange(f64),

    #[error(
        "success_threshold {success_threshold} exceeds max_half_open_requests {max_half_open_requests}; the breaker could never close"
    )]
    UnreachableSuccessThreshold {
        success_threshold: u32,
        max_half_open_requests: u32,
    },
}

/// Check a breaker tuning for values that would break the state machine.
pub fn validate_breaker_config(config: &CircuitBreakerConfig) -> Result<(), BreakerConfigError> {
    if config.failure_threshold == 0 {
        return Err(BreakerConfigError::ZeroFailureThreshold);
    }
    if config.success_threshold == 0 {
        return Err(BreakerConfigError::ZeroSuccessThreshold);
    }
    if config.max_half_open_requests == 0 {
        return Err(BreakerConfigError::ZeroHalfOpenRequests);
    }
    if config.open_timeout_ms == 0 {
        return Err(BreakerConfigError::ZeroOpenTimeout);
    }
    if !(0.0..=1.0).contains(&config.failure_rate_threshold) {
        return Err(BreakerConfigError::FailureRateOutOfRange(
            config.failure_rate_threshold,
        ));
    }
    if config.success_threshold > config.max_half_open_requests {
        return Err(BreakerConfigError::UnreachableSuccessThreshold {
            success_threshold: config.success_threshold,
            max_half_open_requests: config.max_half_open_requests,
        });
    }
    Ok(())
}

/// Error returned by a guarded call.
#[derive(Debug)]
pub enum CallError<E> {
    /// The breaker rejected the call; the operation was never invoked.
    CircuitOpen { service: String },
    /// The caller cancelled before the breaker granted permission.
    Cancelled { service: String },
    /// The operation ran and returned this error.
    Operation(E),
}

impl<E> CallError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    /// The wrapped operation error, if the operation ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::CircuitOpen { service } => {
                write!(f, "circuit breaker is open for {}", service)
            }
            CallError::Cancelled { service } => {
                write!(f, "call to {} cancelled before it was admitted", service)
            }
            CallError::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
    }

    #[test]
    fn test_state_conversion() {
        for state in [BreakerState::Closed, BreakerState::Open, BreakerState::HalfOpen] {
            assert_eq!(BreakerState::from(state as u8), state);
        }
        assert_eq!(BreakerState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_validate_rejects_bad_tunings() {
        assert_eq!(validate_breaker_config(&config()), Ok(()));

        let zero_success = CircuitBreakerConfig { success_threshold: 0, ..config() };
        assert_eq!(
            validate_breaker_config(&zero_success),
            Err(BreakerConfigError::ZeroSuccessThreshold)
        );

        let bad_rate = CircuitBreakerConfig { failure_rate_threshold: 1.01, ..config() };
        assert!(matches!(
            validate_breaker_config(&bad_rate),
            Err(BreakerConfigError::FailureRateOutOfRange(_))
        ));

        let unreachable = CircuitBreakerConfig {
            success_threshold: 4,
            max_half_open_requests: 3,
            ..config()
        };
        assert!(matches!(
            validate_breaker_config(&unreachable),
            Err(BreakerConfigError::UnreachableSuccessThreshold { .. })
        ));
    }

    #[test]
    fn test_call_error_display() {
        let err: CallError<std::io::Error> = CallError::CircuitOpen {
            service: "audit-service".into(),
        };
        assert_eq!(err.to_string(), "circuit breaker is open for audit-service");
        assert!(err.is_circuit_open());

        let err = CallError::Operation(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "boom");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.into_operation().is_some());
    }
}
