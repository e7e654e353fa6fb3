//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, task per connection)
//!     → request.rs (read and parse request head)
//!     → target.rs (extract target reference after the first '?')
//!     → [pipeline decides local / remote / archive]
//!     → headers.rs (synthesize response headers)
//!     → response.rs (status line + header block)
//!     → copy.rs + chunked.rs (bounded body streaming, optional chunking)
//!     → Send to client
//! ```

pub mod chunked;
pub mod copy;
pub mod headers;
pub mod mime;
pub mod request;
pub mod response;
pub mod server;
pub mod target;

pub use headers::ResponseHeaderSet;
pub use response::ResponseWriter;
pub use server::GatewayServer;
pub use target::TargetReference;
