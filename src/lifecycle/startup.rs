//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Start the metrics exporter when enabled
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::http::server::{GatewayServer, ServerError};
use crate::observability::metrics::{init_metrics, MetricsError};

use super::shutdown::Shutdown;

/// Why the gateway could not start or stopped abnormally.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Serve on `config.listener.port` with `config.storage.data_root` until
/// `shutdown` is triggered.
pub async fn serve(config: GatewayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    if config.observability.metrics_enabled {
        // Address was checked by validation.
        if let Ok(address) = config.observability.metrics_address.parse::<SocketAddr>() {
            init_metrics(address)?;
        }
    }

    let server = GatewayServer::bind(&config).await?;
    server.run(shutdown.subscribe()).await?;
    Ok(())
}
