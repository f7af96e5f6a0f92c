//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds sane, addresses parse)
//! - Reject breaker tunings that could never trip or never close
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::resilience::{BreakerConfigError, validate_breaker_config};

/// A single semantic problem found in the configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid address '{address}' for {field}")]
    InvalidAddress { field: &'static str, address: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: String },

    #[error("invalid URL '{url}' for service {service}")]
    InvalidUrl { service: &'static str, url: String },

    #[error("circuit breaker for {service}: {source}")]
    Breaker {
        service: &'static str,
        #[source]
        source: BreakerConfigError,
    },

    #[error("unknown log format '{0}' (expected \"json\" or \"pretty\")")]
    UnknownLogFormat(String),
}

/// Validate a loaded configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            address: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "server.request_timeout_secs".to_string(),
        });
    }

    for (name, service) in config.services.entries() {
        match url::Url::parse(&service.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidUrl {
                service: name,
                url: service.url.clone(),
            }),
        }
        if service.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout {
                field: format!("{}.timeout_ms", name),
            });
        }
        if let Err(source) = validate_breaker_config(&service.circuit_breaker) {
            errors.push(ValidationError::Breaker { service: name, source });
        }
    }

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "json" | "pretty") {
        errors.push(ValidationError::UnknownLogFormat(observability.log_format.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            address: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RISK_MANAGEMENT_SERVICE;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.services.audit.url = "ftp://audit".into();
        config.services.risk_management.circuit_breaker.success_threshold = 0;
        config.observability.log_format = "xml".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Breaker {
            service: RISK_MANAGEMENT_SERVICE,
            source: BreakerConfigError::ZeroSuccessThreshold,
        }));
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());
    }
}
