//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, block size > 0)
//! - Validate addresses that are only parsed later at startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("listener.max_request_head_bytes must be at least {min}, got {actual}")]
    HeadLimitTooSmall { min: usize, actual: usize },

    #[error("observability.metrics_address is not a socket address: {0}")]
    MetricsAddress(String),

    #[error("storage.data_root must not be empty")]
    EmptyDataRoot,
}

/// Smallest request head limit that still fits a realistic request line.
const MIN_REQUEST_HEAD_BYTES: usize = 1024;

/// Check every semantic constraint, collecting all violations.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("transfer.block_bytes", config.transfer.block_bytes as u64),
        ("timeouts.fetch_secs", config.timeouts.fetch_secs),
        ("timeouts.request_head_secs", config.timeouts.request_head_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.listener.max_request_head_bytes < MIN_REQUEST_HEAD_BYTES {
        errors.push(ValidationError::HeadLimitTooSmall {
            min: MIN_REQUEST_HEAD_BYTES,
            actual: config.listener.max_request_head_bytes,
        });
    }

    if config.storage.data_root.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyDataRoot);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
