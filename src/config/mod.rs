//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → breaker registry + service clients built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers never change tuning at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CircuitBreakerConfig;
pub use schema::GatewayConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
pub use schema::ServiceConfig;
pub use schema::ServicesConfig;
