//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (bound request head size and read time)
//!     → http layer
//!
//! Origin response:
//!     → headers.rs (drop hop-by-hop headers)
//!     → header synthesis
//! ```
//!
//! # Design Decisions
//! - Fail closed: an oversized or stalled request head is rejected
//! - No trust in client input

pub mod headers;
pub mod limits;
