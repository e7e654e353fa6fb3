//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind host, port, limits).
    pub listener: ListenerConfig,

    /// Local storage served before falling back to remote fetches.
    pub storage: StorageConfig,

    /// Body streaming settings.
    pub transfer: TransferConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Port used when neither `PORT` nor a CLI argument provides one.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Upper bound on the size of an inbound request head.
    pub max_request_head_bytes: usize,
}

impl ListenerConfig {
    /// Socket address string for the given port.
    pub fn bind_address(&self, port: u16) -> String {
        if self.bind_host.contains(':') {
            format!("[{}]:{}", self.bind_host, port)
        } else {
            format!("{}:{}", self.bind_host, port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
            max_request_head_bytes: 16 * 1024,
        }
    }
}

/// Local data directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that relative targets are resolved against.
    pub data_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
        }
    }
}

/// Body streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Size of each block read from a source and written to the client.
    pub block_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_bytes: 16 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a remote fetch, in seconds.
    pub fetch_secs: u64,

    /// Time allowed for a client to send its request head, in seconds.
    pub request_head_secs: u64,

    /// Time in-flight transfers get to finish after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch_secs: 30,
            request_head_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.storage.data_root, PathBuf::from("./data"));
        assert_eq!(config.transfer.block_bytes, 16384);
        assert_eq!(config.timeouts.fetch_secs, 30);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            port = 9000

            [storage]
            data_root = "/srv/files"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.bind_host, "0.0.0.0");
        assert_eq!(config.storage.data_root, PathBuf::from("/srv/files"));
        assert_eq!(config.transfer.block_bytes, 16384);
    }

    #[test]
    fn bind_address_brackets_ipv6_hosts() {
        let mut listener = ListenerConfig::default();
        assert_eq!(listener.bind_address(8080), "0.0.0.0:8080");

        listener.bind_host = "::1".to_string();
        assert_eq!(listener.bind_address(8080), "[::1]:8080");
    }
}
