//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the trading gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Inbound HTTP server settings.
    pub server: ServerConfig,

    /// Downstream dependencies, each guarded by its own circuit breaker.
    pub services: ServicesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Inbound server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout for inbound requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Circuit breaker tuning for a single dependency.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Probes allowed through while half-open.
    pub max_half_open_requests: u32,

    /// Time after the last failure before probing, in milliseconds.
    pub open_timeout_ms: u64,

    /// Absolute failure count that trips the breaker.
    pub failure_threshold: u32,

    /// Successful probes needed to close from half-open.
    pub success_threshold: u32,

    /// Failure fraction (0.0-1.0) that trips the breaker once
    /// `minimum_requests` have been observed.
    pub failure_rate_threshold: f64,

    /// Sample floor before the failure rate is considered.
    pub minimum_requests: u32,
}

impl CircuitBreakerConfig {
    /// Open timeout as a `Duration`.
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_half_open_requests: 5,
            open_timeout_ms: 60_000,
            failure_threshold: 10,
            success_threshold: 3,
            failure_rate_threshold: 0.5,
            minimum_requests: 5,
        }
    }
}

/// A single downstream dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL (e.g., "http://localhost:8082").
    pub url: String,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Breaker guarding this dependency.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ServiceConfig {
    /// Per-call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            timeout_ms: 5_000,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Service name of the market data dependency.
pub const MARKET_DATA_SERVICE: &str = "market-data-service";
/// Service name of the portfolio dependency.
pub const PORTFOLIO_SERVICE: &str = "portfolio-service";
/// Service name of the risk management dependency.
pub const RISK_MANAGEMENT_SERVICE: &str = "risk-management-service";
/// Service name of the notification dependency.
pub const NOTIFICATION_SERVICE: &str = "notification-service";
/// Service name of the audit dependency.
pub const AUDIT_SERVICE: &str = "audit-service";

/// All dependencies of the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub market_data: ServiceConfig,
    pub portfolio: ServiceConfig,
    pub risk_management: ServiceConfig,
    pub notification: ServiceConfig,
    pub audit: ServiceConfig,
}

impl ServicesConfig {
    /// Dependencies paired with the service name their breaker reports under.
    pub fn entries(&self) -> [(&'static str, &ServiceConfig); 5] {
        [
            (MARKET_DATA_SERVICE, &self.market_data),
            (PORTFOLIO_SERVICE, &self.portfolio),
            (RISK_MANAGEMENT_SERVICE, &self.risk_management),
            (NOTIFICATION_SERVICE, &self.notification),
            (AUDIT_SERVICE, &self.audit),
        ]
    }
}

fn service(url: &str, timeout_ms: u64, circuit_breaker: CircuitBreakerConfig) -> ServiceConfig {
    ServiceConfig {
        url: url.to_string(),
        timeout_ms,
        circuit_breaker,
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            market_data: service(
                "http://localhost:8082",
                5_000,
                CircuitBreakerConfig {
                    max_half_open_requests: 3,
                    open_timeout_ms: 30_000,
                    failure_threshold: 5,
                    success_threshold: 2,
                    failure_rate_threshold: 0.5,
                    minimum_requests: 3,
                },
            ),
            portfolio: service(
                "http://localhost:8081",
                5_000,
                CircuitBreakerConfig {
                    max_half_open_requests: 5,
                    open_timeout_ms: 20_000,
                    failure_threshold: 3,
                    success_threshold: 2,
                    failure_rate_threshold: 0.6,
                    minimum_requests: 2,
                },
            ),
            risk_management: service(
                "http://localhost:8083",
                3_000,
                CircuitBreakerConfig {
                    max_half_open_requests: 2,
                    open_timeout_ms: 15_000,
                    failure_threshold: 2,
                    success_threshold: 1,
                    failure_rate_threshold: 0.3,
                    minimum_requests: 2,
                },
            ),
            notification: service(
                "http://localhost:8084",
                2_000,
                CircuitBreakerConfig {
                    max_half_open_requests: 10,
                    open_timeout_ms: 10_000,
                    failure_threshold: 10,
                    success_threshold: 3,
                    failure_rate_threshold: 0.8,
                    minimum_requests: 5,
                },
            ),
            audit: service(
                "http://localhost:8085",
                3_000,
                CircuitBreakerConfig {
                    max_half_open_requests: 15,
                    open_timeout_ms: 5_000,
                    failure_threshold: 15,
                    success_threshold: 5,
                    failure_rate_threshold: 0.9,
                    minimum_requests: 10,
                },
            ),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("json" or "pretty").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
