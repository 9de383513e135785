//! Semantic configuration checks, run after deserialization.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    BadBindAddress(String),
    #[error("no backends configured")]
    NoBackends,
    #[error("backend address {0:?} is not a valid socket address")]
    BadBackendAddress(String),
    #[error("rate_limit.{0} must be positive")]
    NonPositiveRateLimit(&'static str),
    #[error("health_check.{0} must be positive")]
    NonPositiveHealthCheck(&'static str),
    #[error("observability.metrics_address {0:?} is not a valid socket address")]
    BadMetricsAddress(String),
}

/// Collect every semantic problem rather than stopping at the first.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for backend in &config.backends {
        if backend.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::BadBackendAddress(backend.clone()));
        }
    }

    let rl = &config.rate_limit;
    if rl.default_capacity <= 0 {
        errors.push(ValidationError::NonPositiveRateLimit("default_capacity"));
    }
    if rl.default_rate_per_sec <= 0 {
        errors.push(ValidationError::NonPositiveRateLimit("default_rate_per_sec"));
    }
    if rl.cost_per_request <= 0 {
        errors.push(ValidationError::NonPositiveRateLimit("cost_per_request"));
    }
    if rl.refill_interval_secs == 0 {
        errors.push(ValidationError::NonPositiveRateLimit("refill_interval_secs"));
    }

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::NonPositiveHealthCheck("interval_secs"));
    }
    if hc.probe_timeout_secs == 0 {
        errors.push(ValidationError::NonPositiveHealthCheck("probe_timeout_secs"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::BadMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
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

    fn valid_config() -> GatewayConfig {
        GatewayConfig {
            backends: vec!["127.0.0.1:9001".into(), "127.0.0.1:9002".into()],
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn accepts_a_minimal_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_empty_backend_list() {
        let config = GatewayConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoBackends)));
    }

    #[test]
    fn rejects_unparseable_backend_address() {
        let mut config = valid_config();
        config.backends.push("not-an-address".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BadBackendAddress(_))));
    }

    #[test]
    fn rejects_non_positive_quota_defaults() {
        let mut config = valid_config();
        config.rate_limit.default_capacity = 0;
        config.rate_limit.cost_per_request = -1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::NonPositiveRateLimit(_)))
                .count(),
            2
        );
    }

    #[test]
    fn rejects_bad_metrics_address_only_when_enabled() {
        let mut config = valid_config();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
