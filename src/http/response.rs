//! Writing responses onto the client connection.
//!
//! # Responsibilities
//! - Serialize status line and header blocks
//! - Track whether a head has gone out (errors after that point can only be
//!   logged, not answered)
//! - Build plain-text error responses
//!
//! # Design Decisions
//! - Every head carries `Connection: close`; one transfer per connection
//! - Heads are assembled in memory and written with one call
//! - A header whose name or value is not valid on the wire is dropped rather
//!   than written
//! - Chunked bodies are only sent to HTTP/1.1 clients; HTTP/1.0 clients get
//!   the raw body delimited by the connection close

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::{
    ResponseHeaderSet, ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
};

/// Client connection wrapper that remembers what was already sent.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    inner: W,
    heads_sent: usize,
    chunked: bool,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            heads_sent: 0,
            chunked: true,
        }
    }

    /// Whether the peer understands chunked transfer coding.
    pub fn set_accepts_chunked(&mut self, accepts: bool) {
        self.chunked = accepts;
    }

    pub fn accepts_chunked(&self) -> bool {
        self.chunked
    }

    /// True once any status line has been written.
    pub fn head_sent(&self) -> bool {
        self.heads_sent > 0
    }

    /// Number of header blocks written so far.
    pub fn heads_sent(&self) -> usize {
        self.heads_sent
    }

    /// Body sink for the stream copier.
    pub fn body(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write a status line and header block.
    pub async fn send_head(
        &mut self,
        status: StatusCode,
        headers: &ResponseHeaderSet,
    ) -> std::io::Result<()> {
        let head = encode_head(status, headers);
        self.inner.write_all(head.as_bytes()).await?;
        self.heads_sent += 1;
        Ok(())
    }

    /// Write a complete plain-text error response.
    pub async fn send_error(&mut self, status: StatusCode, message: &str) -> std::io::Result<()> {
        let mut headers = ResponseHeaderSet::new();
        headers.set(CONTENT_TYPE, "text/plain; charset=utf-8");
        headers.set(CONTENT_LENGTH, message.len().to_string());
        headers.set(ACCESS_CONTROL_ALLOW_ORIGIN, "*");

        self.send_head(status, &headers).await?;
        self.inner.write_all(message.as_bytes()).await?;
        self.inner.flush().await
    }
}

/// `HTTP/1.1 <code> <reason>` followed by the headers and a blank line.
pub fn encode_head(status: StatusCode, headers: &ResponseHeaderSet) -> String {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case(CONNECTION) {
            continue;
        }
        if HeaderName::from_bytes(name.as_bytes()).is_err()
            || HeaderValue::from_bytes(value.as_bytes()).is_err()
        {
            tracing::warn!(header = name, "Dropping header that is not valid on the wire");
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::headers::{for_local_file, for_remote};

    #[test]
    fn head_lists_headers_in_order() {
        let head = encode_head(StatusCode::OK, &for_local_file("a.txt", 3));
        assert_eq!(
            head,
            "HTTP/1.1 200 OK\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Content-Type: application/octet-stream\r\n\
             Content-Length: 3\r\n\
             Content-Disposition: attachment; filename=a.txt\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn connection_header_is_never_duplicated() {
        let mut headers = ResponseHeaderSet::new();
        headers.set("connection", "keep-alive");
        let head = encode_head(StatusCode::OK, &headers);
        assert_eq!(head.matches("Connection:").count(), 1);
        assert!(head.contains("Connection: close"));
    }

    #[test]
    fn values_with_line_breaks_are_not_written() {
        let mut headers = ResponseHeaderSet::new();
        headers.set("X-Note", "a\r\nSet-Cookie: pwn=1");
        headers.set(CONTENT_TYPE, "text/plain");
        let head = encode_head(StatusCode::OK, &headers);
        assert!(!head.contains("Set-Cookie"));
        assert!(head.contains("Content-Type: text/plain\r\n"));
    }

    #[test]
    fn crafted_url_cannot_split_the_head() {
        let target = crate::http::target::resolve(
            "/?http://origin.test/a%250D%250ASet-Cookie:%2520pwn=1",
        )
        .unwrap();
        let headers = for_remote(target.url().unwrap(), [("content-type", "text/plain")]);
        let head = encode_head(StatusCode::OK, &headers);
        assert!(!head.contains("\r\nSet-Cookie"));
        assert!(head.contains("Content-Disposition: attachment; filename=aSet-Cookie: pwn=1\r\n"));
    }

    #[test]
    fn non_ascii_filenames_survive() {
        let head = encode_head(StatusCode::OK, &for_local_file("résumé.csv", 1));
        assert!(head.contains("filename=résumé.csv\r\n"));
    }

    #[tokio::test]
    async fn error_response_has_length_and_body() {
        let mut writer = ResponseWriter::new(Vec::new());
        assert!(!writer.head_sent());

        writer
            .send_error(StatusCode::NOT_FOUND, "HTTP Error 404: Not Found")
            .await
            .unwrap();

        assert!(writer.head_sent());
        let wire = String::from_utf8(writer.into_inner()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(wire.contains("Content-Length: 25\r\n"));
        assert!(wire.ends_with("\r\n\r\nHTTP Error 404: Not Found"));
    }
}
