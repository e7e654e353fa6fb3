//! Inbound request head parsing.
//!
//! # Responsibilities
//! - Read bytes until a complete request head is buffered
//! - Parse the request line and headers with `httparse`
//! - Enforce head size limits while reading
//!
//! # Design Decisions
//! - Bodies are never read; the gateway only serves retrieval requests
//! - The read deadline is applied by the caller around `read_request_head`

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::security::limits::MAX_REQUEST_HEADERS;

/// Failure while receiving a request head.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("malformed request head: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("request head exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("client closed the connection before sending a request")]
    Closed,

    #[error("reading request head failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The parts of a request the gateway looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    /// Minor HTTP version: `0` for HTTP/1.0, `1` for HTTP/1.1.
    pub version: u8,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn is_retrieval(&self) -> bool {
        self.method == "GET"
    }

    /// HTTP/1.0 peers cannot decode chunked bodies.
    pub fn accepts_chunked(&self) -> bool {
        self.version >= 1
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read from `reader` until a full request head is available.
pub async fn read_request_head<R>(reader: &mut R, max_bytes: usize) -> Result<RequestHead, RequestError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(1024);
    let mut scratch = [0u8; 1024];

    loop {
        let n = reader.read(&mut scratch).await?;
        if n == 0 {
            return Err(RequestError::Closed);
        }
        buf.extend_from_slice(&scratch[..n]);

        if let Some(head) = parse_head(&buf)? {
            return Ok(head);
        }
        if buf.len() >= max_bytes {
            return Err(RequestError::TooLarge { limit: max_bytes });
        }
    }
}

fn parse_head(bytes: &[u8]) -> Result<Option<RequestHead>, RequestError> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_REQUEST_HEADERS];
    let mut request = httparse::Request::new(&mut header_storage);

    match request.parse(bytes)? {
        httparse::Status::Partial => Ok(None),
        httparse::Status::Complete(_) => {
            let headers = request
                .headers
                .iter()
                .map(|h| {
                    (
                        h.name.to_string(),
                        String::from_utf8_lossy(h.value).trim().to_string(),
                    )
                })
                .collect();
            Ok(Some(RequestHead {
                method: request.method.unwrap_or_default().to_string(),
                target: request.path.unwrap_or_default().to_string(),
                version: request.version.unwrap_or(1),
                headers,
            }))
        }
    }
}
