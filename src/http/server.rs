//! Gateway server: accept loop and per-connection driver.
//!
//! # Responsibilities
//! - Accept connections until shutdown is signalled
//! - Spawn one task per connection, each inside a `connection` span
//! - Read and vet the request head, then hand the target to the pipeline
//! - Record per-request logs and metrics
//! - Drain in-flight transfers for a bounded grace period on shutdown
//!
//! # Design Decisions
//! - One request per connection; the socket is shut down after the transfer
//! - Nothing is shared between tasks except the read-only pipeline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::http::request::{read_request_head, RequestError};
use crate::http::ResponseWriter;
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::pipeline::{self, GatewayError, PipelineFailure, RequestPipeline, Stage, Transfer};
use crate::security::limits::RequestLimits;
use crate::source::FetchError;

/// How long a rejected connection keeps reading before it is closed.
const LINGER: Duration = Duration::from_secs(1);

/// Failure that stops the server as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to build remote fetch client: {0}")]
    Client(#[from] FetchError),
}

/// State every connection task reads.
#[derive(Debug)]
struct ConnectionContext {
    pipeline: RequestPipeline,
    limits: RequestLimits,
}

/// HTTP gateway bound to a listening socket.
#[derive(Debug)]
pub struct GatewayServer {
    listener: Listener,
    context: Arc<ConnectionContext>,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl GatewayServer {
    /// Bind the listener on `config.listener.port` and prepare the pipeline.
    pub async fn bind(config: &GatewayConfig) -> Result<Self, ServerError> {
        let pipeline = RequestPipeline::new(config)?;
        let listener = Listener::bind(&config.listener, config.listener.port).await?;

        Ok(Self {
            listener,
            context: Arc::new(ConnectionContext {
                pipeline,
                limits: RequestLimits::from_config(config),
            }),
            tracker: ConnectionTracker::new(),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires, then drain.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = self.listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(
            address = %addr,
            data_root = %self.context.pipeline.data_root().display(),
            "Gateway serving"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }

        let Self {
            listener,
            tracker,
            shutdown_grace,
            ..
        } = self;
        drop(listener);

        let in_flight = tracker.active_count();
        if in_flight > 0 {
            tracing::info!(in_flight, grace_secs = shutdown_grace.as_secs(), "Draining connections");
        }
        if !tracker.drain(shutdown_grace).await {
            tracing::warn!(
                remaining = tracker.active_count(),
                "Grace period elapsed with transfers still running"
            );
        }

        tracing::info!("Gateway stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let span = tracing::info_span!("connection", connection_id = %guard.id(), peer = %peer);
        let context = Arc::clone(&self.context);

        tokio::spawn(
            async move {
                serve_connection(stream, &context, guard).await;
                drop(permit);
            }
            .instrument(span),
        );
    }
}

async fn serve_connection(mut stream: TcpStream, context: &ConnectionContext, _guard: ConnectionGuard) {
    let start = Instant::now();
    let limits = context.limits;

    let head = match tokio::time::timeout(
        limits.head_timeout,
        read_request_head(&mut stream, limits.max_head_bytes),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(
                timeout_secs = limits.head_timeout.as_secs(),
                "Request head not received in time"
            );
            return;
        }
    };

    let unread_input = !matches!(&head, Ok(h) if h.is_retrieval());
    let mut writer = ResponseWriter::new(stream);
    let outcome = match head {
        Err(RequestError::Closed) => {
            tracing::debug!("Client closed before sending a request");
            return;
        }
        Err(e) => {
            let failure = PipelineFailure::new(Stage::ReadRequest, GatewayError::from(e));
            Err(pipeline::answer(failure, "", &mut writer).await)
        }
        Ok(head) if !head.is_retrieval() => {
            let failure = PipelineFailure::new(
                Stage::ReadRequest,
                GatewayError::UnsupportedMethod(head.method.clone()),
            );
            Err(pipeline::answer(failure, &head.target, &mut writer).await)
        }
        Ok(head) => {
            tracing::debug!(
                request_target = %head.target,
                version = head.version,
                host = head.header("host").unwrap_or("-"),
                "Request received"
            );
            writer.set_accepts_chunked(head.accepts_chunked());
            context.pipeline.handle(&head.target, &mut writer).await
        }
    };

    report(&outcome, start);

    let mut stream = writer.into_inner();
    if let Err(e) = stream.shutdown().await {
        tracing::trace!(error = %e, "Socket shutdown failed");
        return;
    }
    if unread_input {
        discard_input(&mut stream).await;
    }
}

/// Read and drop what the client is still sending so closing the socket
/// does not reset the connection before the error response is read.
async fn discard_input(stream: &mut TcpStream) {
    let mut sink = [0u8; 1024];
    let drain = async {
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(LINGER, drain).await;
}

fn report(outcome: &Result<Transfer, PipelineFailure>, start: Instant) {
    match outcome {
        Ok(transfer) => {
            let source = transfer.source.as_str();
            metrics::record_request(source, transfer.status.as_u16(), start);
            metrics::record_bytes_sent(source, transfer.bytes);
            tracing::info!(
                source,
                status = transfer.status.as_u16(),
                bytes = transfer.bytes,
                responses = transfer.responses,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Transfer complete"
            );
        }
        Err(failure) => {
            let status = failure.error.status().as_u16();
            metrics::record_request("failed", status, start);
            match (&failure.error, failure.answered) {
                (GatewayError::ConnectionAbort(e), _) => tracing::warn!(
                    stage = failure.stage.as_str(),
                    error = %e,
                    "Client connection aborted mid-transfer"
                ),
                (error, Some(answered)) => tracing::warn!(
                    stage = failure.stage.as_str(),
                    status = answered.as_u16(),
                    error = ?error,
                    "Request failed"
                ),
                (error, None) => tracing::error!(
                    stage = failure.stage.as_str(),
                    error = ?error,
                    "Request failed after the response had started"
                ),
            }
        }
    }
}
