//! File gateway
//!
//! Answers `GET /<anything>?<target>` from `./data/<target>` when that file
//! exists, otherwise fetches `<target>` as an absolute URL and forwards it.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────▶ net::listener ─▶ http::server ─▶ http::request (head)
//!                                                     │
//!                                                     ▼
//!                                               pipeline
//!                              ┌──────────────────┼──────────────────┐
//!                              ▼                  ▼                  ▼
//!                         local file        remote passthrough   archive expand
//!                         (source::locator) (source::remote)     (archive::*)
//!                              └──────────────────┼──────────────────┘
//!                                                 ▼
//!     Client Response      http::headers + http::response + http::copy/chunked
//!     ◀───────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use file_gateway::config::{load_or_default, resolve_port, PORT_ENV_VAR};
use file_gateway::lifecycle::{self, signals, Shutdown};
use file_gateway::observability::logging::init_logging;

/// Serve local files or proxy remote resources named after the first `?`.
#[derive(Debug, Parser)]
#[command(name = "file-gateway", version, about)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to listen on when the PORT environment variable is not set.
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    init_logging(&config.observability.log_level);

    let env_port = std::env::var(PORT_ENV_VAR).ok();
    config.listener.port = resolve_port(env_port.as_deref(), cli.port, config.listener.port)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        data_root = %config.storage.data_root.display(),
        fetch_timeout_secs = config.timeouts.fetch_secs,
        "file-gateway starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    lifecycle::serve(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
