//! Bounded block copying from a source stream to the client.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::chunked::BodyFraming;

/// Which side of a copy failed.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("reading source failed: {0}")]
    Source(#[source] std::io::Error),

    #[error("writing to client failed: {0}")]
    Sink(#[source] std::io::Error),
}

/// Copy `src` to `dst` one block at a time until end-of-data, then terminate
/// the body according to `framing`. Returns the number of payload bytes.
///
/// Only one block of `block_size` bytes is resident at any time. Nothing is
/// retried; the first error ends the copy.
pub async fn copy_blocks<R, W>(
    src: &mut R,
    dst: &mut W,
    framing: BodyFraming,
    block_size: usize,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut block = vec![0u8; block_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = src.read(&mut block).await.map_err(CopyError::Source)?;
        if n == 0 {
            break;
        }
        framing
            .write_block(dst, &block[..n])
            .await
            .map_err(CopyError::Sink)?;
        copied += n as u64;
    }

    framing.finish(dst).await.map_err(CopyError::Sink)?;
    Ok(copied)
}
