//! File gateway library.
//!
//! Serves a GET request either from a local data directory or by fetching
//! the absolute URL embedded after the first `?` of the request path,
//! expanding zip and tar archives member by member.

pub mod archive;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod security;
pub mod source;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use pipeline::RequestPipeline;
