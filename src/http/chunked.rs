//! Body framing for the client connection.
//!
//! Known-length bodies (local files, archive members) go out as-is. When the
//! forwarded headers declare `Transfer-Encoding: chunked`, each block is
//! wrapped as `<hex len>\r\n<bytes>\r\n` and the body ends with `0\r\n\r\n`.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::ResponseHeaderSet;

/// Zero-length chunk plus the empty trailer section.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// How body bytes are framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFraming {
    /// Raw bytes; length is known from `Content-Length` or connection close.
    #[default]
    Identity,
    /// Chunked transfer coding.
    Chunked,
}

impl BodyFraming {
    /// Framing demanded by a response header set.
    pub fn for_headers(headers: &ResponseHeaderSet) -> Self {
        if headers.declares_chunked() {
            Self::Chunked
        } else {
            Self::Identity
        }
    }

    /// Write one block. Empty blocks are skipped so they never read as the
    /// terminating chunk.
    pub async fn write_block<W>(&self, dst: &mut W, block: &[u8]) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if block.is_empty() {
            return Ok(());
        }
        match self {
            Self::Identity => dst.write_all(block).await,
            Self::Chunked => {
                dst.write_all(chunk_size_line(block.len()).as_bytes()).await?;
                dst.write_all(block).await?;
                dst.write_all(b"\r\n").await
            }
        }
    }

    /// Terminate the body once the source is exhausted.
    pub async fn finish<W>(&self, dst: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if *self == Self::Chunked {
            dst.write_all(LAST_CHUNK).await?;
        }
        dst.flush().await
    }
}

fn chunk_size_line(len: usize) -> String {
    format!("{len:x}\r\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Decode a complete chunked body, requiring the zero-length terminator.
    pub(crate) fn decode_chunked(mut wire: &[u8]) -> Result<Vec<u8>, String> {
        let mut body = Vec::new();
        loop {
            let line_end = wire
                .windows(2)
                .position(|w| w == b"\r\n")
                .ok_or("missing size line")?;
            let size_text = std::str::from_utf8(&wire[..line_end]).map_err(|e| e.to_string())?;
            let size = usize::from_str_radix(size_text.trim(), 16).map_err(|e| e.to_string())?;
            wire = &wire[line_end + 2..];
            if size == 0 {
                return if wire == b"\r\n" {
                    Ok(body)
                } else {
                    Err("bytes after terminator".into())
                };
            }
            if wire.len() < size + 2 || &wire[size..size + 2] != b"\r\n" {
                return Err("truncated chunk".into());
            }
            body.extend_from_slice(&wire[..size]);
            wire = &wire[size + 2..];
        }
    }

    #[tokio::test]
    async fn chunked_round_trip() {
        let payload: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        let mut wire = Vec::new();
        let framing = BodyFraming::Chunked;
        for block in payload.chunks(16 * 1024) {
            framing.write_block(&mut wire, block).await.unwrap();
        }
        framing.finish(&mut wire).await.unwrap();

        assert!(wire.starts_with(b"4000\r\n"));
        assert!(wire.ends_with(LAST_CHUNK));
        assert_eq!(decode_chunked(&wire).unwrap(), payload);
    }

    #[tokio::test]
    async fn empty_chunked_body_is_only_terminator() {
        let mut wire = Vec::new();
        BodyFraming::Chunked.write_block(&mut wire, b"").await.unwrap();
        BodyFraming::Chunked.finish(&mut wire).await.unwrap();
        assert_eq!(wire, LAST_CHUNK);
        assert_eq!(decode_chunked(&wire).unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn identity_writes_raw_bytes() {
        let mut wire = Vec::new();
        BodyFraming::Identity.write_block(&mut wire, b"hello").await.unwrap();
        BodyFraming::Identity.finish(&mut wire).await.unwrap();
        assert_eq!(wire, b"hello");
    }

    #[test]
    fn framing_follows_transfer_encoding() {
        let mut headers = ResponseHeaderSet::new();
        assert_eq!(BodyFraming::for_headers(&headers), BodyFraming::Identity);

        headers.set("transfer-encoding", "gzip, chunked");
        assert_eq!(BodyFraming::for_headers(&headers), BodyFraming::Chunked);

        headers.set("transfer-encoding", "gzip");
        assert_eq!(BodyFraming::for_headers(&headers), BodyFraming::Identity);
    }
}
