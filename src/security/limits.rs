//! Request limits.
//!
//! # Responsibilities
//! - Enforce maximum request head size
//! - Enforce maximum header count
//! - Enforce a deadline for receiving the request head
//!
//! # Design Decisions
//! - Limits checked while reading, before the head is fully buffered
//! - Oversized heads get 431 Request Header Fields Too Large

use std::time::Duration;

use crate::config::GatewayConfig;

/// Maximum number of request headers parsed.
pub const MAX_REQUEST_HEADERS: usize = 64;

/// Limits applied to every inbound request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Largest accepted request head in bytes.
    pub max_head_bytes: usize,
    /// Deadline for the complete head to arrive.
    pub head_timeout: Duration,
}

impl RequestLimits {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_head_bytes: config.listener.max_request_head_bytes,
            head_timeout: Duration::from_secs(config.timeouts.request_head_secs),
        }
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}
