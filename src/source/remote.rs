//! Remote resource fetching.
//!
//! # Responsibilities
//! - Issue the GET for an absolute target URL
//! - Bound the wait for the origin with the configured timeout
//! - Turn origin failure statuses into `FetchError::Status`
//! - Expose the body as an `AsyncRead` for the stream copier
//!
//! # Design Decisions
//! - One shared `reqwest::Client`; it is cheap to clone and holds no
//!   per-request state
//! - No retries; a failed fetch fails the request
//! - Redirects are followed; the final URL is what callers see

use std::pin::Pin;
use std::time::Duration;

use futures_util::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

use crate::archive::ArchiveKind;

/// Streaming body of a fetched resource.
pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Failure to obtain a remote resource.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP Error {code}: {reason}")]
    Status { code: u16, reason: String },

    #[error("timed out after {secs}s waiting for {url}")]
    Timeout { url: String, secs: u64 },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("target is neither a local file nor an absolute URL: {0}")]
    NotAbsolute(String),

    #[error("reading origin body failed: {0}")]
    Body(#[source] std::io::Error),
}

impl FetchError {
    /// Status code the origin answered with, when it answered at all.
    pub fn origin_status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A successfully opened remote resource.
pub struct RemoteResource {
    /// Final URL after redirects.
    pub url: Url,
    /// Origin response headers, in arrival order.
    pub declared_headers: Vec<(String, String)>,
    /// Origin body.
    pub body: BodyReader,
}

impl RemoteResource {
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declared_headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The origin's own `Content-Type`, before any sniffing.
    pub fn declared_content_type(&self) -> Option<&str> {
        self.header_pairs()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v)
    }

    pub fn archive_kind(&self) -> Option<ArchiveKind> {
        self.declared_content_type()
            .and_then(ArchiveKind::from_content_type)
    }
}

impl std::fmt::Debug for RemoteResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResource")
            .field("url", &self.url.as_str())
            .field("declared_headers", &self.declared_headers)
            .finish_non_exhaustive()
    }
}

/// HTTP client wrapper used for every remote target.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// GET `url`; succeeds only on a 2xx answer.
    pub async fn fetch(&self, url: &Url) -> Result<RemoteResource, FetchError> {
        let send = self.client.get(url.clone()).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            })??;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let final_url = response.url().clone();
        let declared_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        tracing::debug!(url = %final_url, status = status.as_u16(), "Origin responded");

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(RemoteResource {
            url: final_url,
            declared_headers,
            body: Box::pin(StreamReader::new(stream)),
        })
    }
}
