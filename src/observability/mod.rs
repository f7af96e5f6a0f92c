//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Circuit breakers produce:
//!     → observer.rs (per-call outcomes, rejections, transitions)
//!         → metrics.rs (counters, gauges, histograms)
//!         → in-memory tallies (status endpoint)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → /api/v1/circuit-breaker/status
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through inbound request spans
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod observer;

pub use observer::{MetricsRegistry, NoopObserver, OutcomeObserver, ServiceTally};
