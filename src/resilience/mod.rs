//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → circuit_breaker.rs (admit or fail fast)
//!     → timeouts.rs (deadline on the remote call)
//!     → circuit_breaker.rs (record outcome, maybe transition)
//!     → recovery.rs (OPEN → HALF_OPEN after the open timeout)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, held in registry.rs
//! - The state machine (state.rs) is pure and lock-free; circuit_breaker.rs
//!   owns the lock, the observer and the timer
//! - Every external call has a deadline

pub mod circuit_breaker;
pub(crate) mod recovery;
pub mod registry;
pub(crate) mod state;
pub mod timeouts;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, Permit};
pub use registry::{BreakerRegistry, RegistryError};
pub use timeouts::{TimeoutError, with_timeout};
pub use types::{
    BreakerConfigError, BreakerSnapshot, BreakerState, CallError, CallOutcome,
    validate_breaker_config,
};
