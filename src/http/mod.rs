//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     TCP connection
//!         → server.rs (Axum setup, request ID, tracing, timeout)
//!         → handlers.rs (decode, call the gateway, map errors to status codes)
//!
//! Outbound:
//!     gateway
//!         → client.rs (JSON over reqwest, guarded by a circuit breaker)
//!         → downstream service
//! ```

pub mod client;
pub mod handlers;
pub mod server;

pub use client::{ClientError, ServiceClient};
pub use server::{AppState, GatewayServer, X_REQUEST_ID};
