//! Content source resolution.
//!
//! # Data Flow
//! ```text
//! TargetReference
//!     → locator.rs (file under data root?)
//!         yes → ContentSource::LocalFile
//!         no  → remote.rs (GET the absolute URL) → ContentSource::Remote
//! ```

pub mod locator;
pub mod remote;

use std::path::PathBuf;

pub use locator::{locate, SourceLocation};
pub use remote::{BodyReader, FetchError, RemoteFetcher, RemoteResource};

/// The one source selected for a request.
#[derive(Debug)]
pub enum ContentSource {
    LocalFile { path: PathBuf, byte_size: u64 },
    Remote(RemoteResource),
}
