//! Trading gateway with per-dependency circuit breakers.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use gateway::TradingGateway;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerState, CallError, CircuitBreaker};
