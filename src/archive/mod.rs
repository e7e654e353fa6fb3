//! Archive expansion subsystem.
//!
//! # Data Flow
//! ```text
//! Remote body (declared zip / tar)
//!     → scratch.rs (persist to an anonymous temp file, seekable)
//!     → expander.rs (blocking worker walks the entries)
//!     → MemberStream channel (one per member, carrying its own block channel)
//!     → pipeline writes one header block per member and streams the body
//!       through the block copier
//! ```
//!
//! # Design Decisions
//! - Routing is by the origin's declared content type only
//! - Decoding is synchronous (`zip`, `tar`) and runs on the blocking pool;
//!   members and their blocks cross to the async side over channels of
//!   capacity one so at most one block is in flight
//! - Directory entries and other non-regular entries are skipped
//! - The scratch file has no name and disappears when its handle drops

pub mod expander;
pub mod scratch;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::http::mime::essence;

pub use expander::expand;

/// Recognized archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
}

impl ArchiveKind {
    /// Map a declared `Content-Type` to an archive kind.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match essence(content_type).as_str() {
            "application/zip" | "application/x-zip-compressed" => Some(Self::Zip),
            "application/x-tar" => Some(Self::Tar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
        }
    }
}

/// One regular file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    pub byte_size: u64,
}

/// A member handed to the async side, with its bytes still to come.
#[derive(Debug)]
pub struct MemberStream {
    pub member: ArchiveMember,
    /// Decompressed blocks in order; the channel closes at end of member.
    pub blocks: mpsc::Receiver<std::io::Result<Bytes>>,
}

impl MemberStream {
    /// Split into the member and a reader over its bytes.
    pub fn into_reader(self) -> (ArchiveMember, impl AsyncRead + Send + Unpin) {
        let blocks = futures_util::stream::unfold(self.blocks, |mut rx| async move {
            rx.recv().await.map(|block| (block, rx))
        });
        (self.member, StreamReader::new(Box::pin(blocks)))
    }
}

/// Failure while expanding an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive contains no regular files")]
    Empty,

    #[error("receiver went away before expansion finished")]
    Cancelled,

    #[error("archive worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
