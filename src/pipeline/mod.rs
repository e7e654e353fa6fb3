//! Per-request orchestration.
//!
//! # Data Flow
//! ```text
//! ResolveTarget → Locate ─┬─ local  → ServeLocal
//!                         └─ remote → FetchRemote ─┬─ zip/tar → ExpandArchive (× members)
//!                                                  └─ other   → ServePassthrough
//! ```
//! Any stage can end in `Failed(GatewayError)`.
//!
//! # Responsibilities
//! - Pick exactly one content source per request
//! - Drive header synthesis and body copying for it
//! - Answer failures with the best status code while no head has been sent
//!
//! # Design Decisions
//! - Nothing is shared between requests except read-only configuration and
//!   the HTTP client
//! - Every open stream and scratch file is owned by the stage that opened it
//!   and dropped on every exit path
//! - Archive members are written back to back on one connection; only the
//!   first is well-formed for a client that does not expect this, so every
//!   extra member is logged

pub mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;

use crate::archive::{self, scratch, ArchiveError, ArchiveKind, MemberStream};
use crate::config::GatewayConfig;
use crate::http::chunked::BodyFraming;
use crate::http::copy::{copy_blocks, CopyError};
use crate::http::headers::{base_name, for_local_file, for_remote, TRANSFER_ENCODING};
use crate::http::target::{self, TargetReference};
use crate::http::ResponseWriter;
use crate::source::{
    locate, ContentSource, FetchError, RemoteFetcher, RemoteResource, SourceLocation,
};

pub use error::GatewayError;

/// Pipeline state a request was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadRequest,
    ResolveTarget,
    Locate,
    ServeLocal,
    FetchRemote,
    ExpandArchive,
    ServePassthrough,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadRequest => "read_request",
            Self::ResolveTarget => "resolve_target",
            Self::Locate => "locate",
            Self::ServeLocal => "serve_local",
            Self::FetchRemote => "fetch_remote",
            Self::ExpandArchive => "expand_archive",
            Self::ServePassthrough => "serve_passthrough",
        }
    }
}

/// Where the bytes of a completed transfer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Remote,
    Archive(ArchiveKind),
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Archive(kind) => kind.as_str(),
        }
    }
}

/// A request that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source: SourceKind,
    pub status: StatusCode,
    /// Body bytes written, framing excluded.
    pub bytes: u64,
    /// Header blocks written; more than one only for multi-member archives.
    pub responses: usize,
}

/// A request that reached `Failed`.
#[derive(Debug)]
pub struct PipelineFailure {
    pub stage: Stage,
    pub error: GatewayError,
    /// Status of the error response, if one could be written.
    pub answered: Option<StatusCode>,
}

impl PipelineFailure {
    pub fn new(stage: Stage, error: impl Into<GatewayError>) -> Self {
        Self {
            stage,
            error: error.into(),
            answered: None,
        }
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineFailure>;
}

impl<T, E: Into<GatewayError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, PipelineFailure> {
        self.map_err(|e| PipelineFailure::new(stage, e))
    }
}

/// Stateless request handler shared by all connections.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    data_root: PathBuf,
    block_size: usize,
    fetcher: RemoteFetcher,
}

impl RequestPipeline {
    pub fn new(config: &GatewayConfig) -> Result<Self, FetchError> {
        let fetcher = RemoteFetcher::new(Duration::from_secs(config.timeouts.fetch_secs))?;
        Ok(Self {
            data_root: config.storage.data_root.clone(),
            block_size: config.transfer.block_bytes,
            fetcher,
        })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Run one request to completion. On failure an error response is
    /// written when nothing has been sent yet and the client is still there.
    pub async fn handle<W>(
        &self,
        request_target: &str,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Transfer, PipelineFailure>
    where
        W: AsyncWrite + Unpin,
    {
        match self.run(request_target, writer).await {
            Ok(transfer) => Ok(transfer),
            Err(failure) => Err(answer(failure, display_target(request_target), writer).await),
        }
    }

    async fn run<W>(
        &self,
        request_target: &str,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Transfer, PipelineFailure>
    where
        W: AsyncWrite + Unpin,
    {
        let target = target::resolve(request_target).at(Stage::ResolveTarget)?;

        match self.open_source(&target).await? {
            ContentSource::LocalFile { path, byte_size } => {
                tracing::debug!(path = %path.display(), byte_size, "Serving local file");
                self.serve_local(&path, byte_size, writer).await
            }
            ContentSource::Remote(resource) => self.serve_remote(resource, writer).await,
        }
    }

    /// Select the one source for `target`: the local file when it exists,
    /// otherwise the opened remote resource.
    async fn open_source(
        &self,
        target: &TargetReference,
    ) -> Result<ContentSource, PipelineFailure> {
        match locate(&self.data_root, target.relative_path()).await {
            SourceLocation::Local { path, byte_size } => {
                Ok(ContentSource::LocalFile { path, byte_size })
            }
            SourceLocation::Remote => {
                let url = target
                    .url()
                    .ok_or_else(|| FetchError::NotAbsolute(target.raw().to_string()))
                    .at(Stage::Locate)?;
                let resource = self.fetcher.fetch(url).await.at(Stage::FetchRemote)?;
                Ok(ContentSource::Remote(resource))
            }
        }
    }

    async fn serve_local<W>(
        &self,
        path: &Path,
        byte_size: u64,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Transfer, PipelineFailure>
    where
        W: AsyncWrite + Unpin,
    {
        let stage = Stage::ServeLocal;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(GatewayError::LocalRead)
            .at(stage)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer
            .send_head(StatusCode::OK, &for_local_file(&name, byte_size))
            .await
            .map_err(GatewayError::ConnectionAbort)
            .at(stage)?;

        // Never send more than the advertised length if the file grows.
        let mut body = file.take(byte_size);
        let bytes = copy_blocks(&mut body, writer.body(), BodyFraming::Identity, self.block_size)
            .await
            .map_err(|e| copy_failure(e, GatewayError::LocalRead))
            .at(stage)?;

        Ok(Transfer {
            source: SourceKind::Local,
            status: StatusCode::OK,
            bytes,
            responses: 1,
        })
    }

    /// Forward or expand an opened remote resource.
    pub async fn serve_remote<W>(
        &self,
        resource: RemoteResource,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Transfer, PipelineFailure>
    where
        W: AsyncWrite + Unpin,
    {
        match resource.archive_kind() {
            Some(kind) => self.expand_archive(resource, kind, writer).await,
            None => self.serve_passthrough(resource, writer).await,
        }
    }

    async fn serve_passthrough<W>(
        &self,
        mut resource: RemoteResource,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Transfer, PipelineFailure>
    where
        W: AsyncWrite + Unpin,
    {
        let stage = Stage::ServePassthrough;
        let mut headers = for_remote(&resource.url, resource.header_pairs());
        if headers.declares_chunked() && !writer.accepts_chunked() {
            headers.remove(TRANSFER_ENCODING);
        }
        let framing = BodyFraming::for_headers(&headers);

        writer
            .send_head(StatusCode::OK, &headers)
            .await
            .map_err(GatewayError::ConnectionAbort)
            .at(stage)?;

        let bytes = copy_blocks(&mut resource.body, writer.body(), framing, self.block_size)
            .await
            .map_err(|e| copy_failure(e, |e| GatewayError::Fetch(FetchError::Body(e))))
            .at(stage)?;

        Ok(Transfer {
            source: SourceKind::Remote,
            status: StatusCode::OK,
            bytes,
            responses: 1,
        })
    }

    async fn expand_archive<W>(
        &self,
        mut resource: RemoteResource,
        kind: ArchiveKind,
        writer: &mut ResponseWriter<W>,
    ) -> Result<Transfer, PipelineFailure>
    where
        W: AsyncWrite + Unpin,
    {
        let stage = Stage::ExpandArchive;
        let (file, stored) = scratch::persist(&mut resource.body, self.block_size)
            .await
            .map_err(|e| match e {
                CopyError::Source(e) => GatewayError::Fetch(FetchError::Body(e)),
                CopyError::Sink(e) => GatewayError::Scratch(e),
            })
            .at(stage)?;
        drop(resource);
        tracing::debug!(kind = kind.as_str(), stored, "Archive persisted to scratch file");

        let block_size = self.block_size;
        let (tx, mut rx) = mpsc::channel(1);
        let worker =
            tokio::task::spawn_blocking(move || archive::expand(file, kind, block_size, tx));

        let mut bytes = 0u64;
        while let Some(stream) = rx.recv().await {
            let (member, mut body) = stream.into_reader();
            if writer.head_sent() {
                tracing::warn!(
                    member = %member.name,
                    index = writer.heads_sent(),
                    "Writing additional archive member on the same connection"
                );
            }

            let headers = for_local_file(base_name(&member.name), member.byte_size);
            let copied = match writer.send_head(StatusCode::OK, &headers).await {
                Ok(()) => {
                    copy_blocks(&mut body, writer.body(), BodyFraming::Identity, block_size).await
                }
                Err(e) => Err(CopyError::Sink(e)),
            };
            match copied {
                Ok(n) => bytes += n,
                Err(e) => {
                    drop(body);
                    return Err(abort(rx, worker, stage, e).await);
                }
            }
        }

        let emitted = worker
            .await
            .map_err(ArchiveError::from)
            .at(stage)?
            .at(stage)?;
        tracing::debug!(kind = kind.as_str(), members = emitted, "Archive expanded");

        Ok(Transfer {
            source: SourceKind::Archive(kind),
            status: StatusCode::OK,
            bytes,
            responses: writer.heads_sent(),
        })
    }
}

/// Stop the expander after a member could not be delivered. A failed read
/// reports the expander's own error; a failed write is a client abort.
async fn abort(
    rx: mpsc::Receiver<MemberStream>,
    worker: tokio::task::JoinHandle<Result<usize, ArchiveError>>,
    stage: Stage,
    error: CopyError,
) -> PipelineFailure {
    drop(rx);
    let outcome = worker.await;
    tracing::debug!(outcome = ?outcome, "Archive worker stopped");

    let error = match (error, outcome) {
        (CopyError::Sink(e), _) => GatewayError::ConnectionAbort(e),
        (CopyError::Source(_), Ok(Err(cause))) => GatewayError::ArchiveFormat(cause),
        (CopyError::Source(e), _) => GatewayError::ArchiveFormat(ArchiveError::Io(e)),
    };
    PipelineFailure::new(stage, error)
}

fn copy_failure(err: CopyError, source: impl FnOnce(std::io::Error) -> GatewayError) -> GatewayError {
    match err {
        CopyError::Source(e) => source(e),
        CopyError::Sink(e) => GatewayError::ConnectionAbort(e),
    }
}

/// Text after the first `?`, or the whole request-target without one.
fn display_target(request_target: &str) -> &str {
    request_target
        .split_once('?')
        .map(|(_, target)| target)
        .unwrap_or(request_target)
}

/// Write the error response for `failure` when the client can still get one.
pub async fn answer<W>(
    mut failure: PipelineFailure,
    target: &str,
    writer: &mut ResponseWriter<W>,
) -> PipelineFailure
where
    W: AsyncWrite + Unpin,
{
    if writer.head_sent() || !failure.error.is_answerable() {
        return failure;
    }

    let status = failure.error.status();
    let message = failure.error.client_message(target);
    match writer.send_error(status, &message).await {
        Ok(()) => failure.answered = Some(status),
        Err(e) => {
            tracing::debug!(error = %e, "Could not deliver error response");
        }
    }
    failure
}
