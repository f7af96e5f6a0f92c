//! Breaker registry.
//!
//! # Responsibilities
//! - Build one breaker per configured dependency at startup
//! - Look breakers up by service name
//! - Collect snapshots for status reporting

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{CircuitBreakerConfig, ServicesConfig};
use crate::observability::OutcomeObserver;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::types::{BreakerConfigError, BreakerSnapshot};

/// A configured service whose breaker tuning was rejected.
#[derive(Debug, Error, PartialEq)]
#[error("invalid circuit breaker configuration for {service}: {source}")]
pub struct RegistryError {
    pub service: String,
    #[source]
    pub source: BreakerConfigError,
}

/// All breakers of the gateway, keyed by service name.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    observer: Arc<dyn OutcomeObserver>,
}

impl BreakerRegistry {
    /// Empty registry reporting to `observer`.
    pub fn new(observer: Arc<dyn OutcomeObserver>) -> Self {
        Self {
            breakers: DashMap::new(),
            observer,
        }
    }

    /// Registry with a breaker for every configured service.
    pub fn from_config(
        services: &ServicesConfig,
        observer: Arc<dyn OutcomeObserver>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new(observer);
        for (name, service) in services.entries() {
            registry
                .register(name, service.circuit_breaker.clone())
                .map_err(|source| RegistryError {
                    service: name.to_string(),
                    source,
                })?;
        }
        Ok(registry)
    }

    /// Create and store a breaker for `name`, replacing any existing one.
    pub fn register(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, BreakerConfigError> {
        let breaker = Arc::new(CircuitBreaker::new(name, config, self.observer.clone())?);
        if self
            .breakers
            .insert(name.to_string(), breaker.clone())
            .is_some()
        {
            tracing::warn!(service = %name, "Replaced existing circuit breaker");
        } else {
            tracing::debug!(service = %name, "Registered circuit breaker");
        }
        Ok(breaker)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        // clone out first so no shard lock is held while taking breaker locks
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        let mut snapshots: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("services", &self.names())
            .finish()
    }
}
