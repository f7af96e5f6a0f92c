//! Trading gateway domain.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → service.rs (TradingGateway orchestrates the trade)
//!         → http::client (one guarded client per dependency)
//!         → fallback.rs (degraded answers when a dependency fails)
//!     → models.rs (wire types)
//! ```

pub mod fallback;
pub mod models;
pub mod service;

pub use service::{GatewayError, TradeOutcome, TradingGateway};
