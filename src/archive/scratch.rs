//! Scratch storage for archive bytes.

use tokio::io::AsyncRead;

use crate::http::chunked::BodyFraming;
use crate::http::copy::{copy_blocks, CopyError};

/// Copy `body` into a fresh anonymous temp file and hand back the std handle
/// for the blocking expander. The file is removed by the OS once the last
/// handle closes, on every exit path.
pub async fn persist<R>(body: &mut R, block_size: usize) -> Result<(std::fs::File, u64), CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| CopyError::Sink(std::io::Error::other(e)))?
        .map_err(CopyError::Sink)?;

    let mut file = tokio::fs::File::from_std(file);
    let stored = copy_blocks(body, &mut file, BodyFraming::Identity, block_size).await?;
    Ok((file.into_std().await, stored))
}
