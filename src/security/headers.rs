//! Origin header sanitizing.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers before forwarding origin headers
//!
//! # Design Decisions
//! - `Transfer-Encoding` is forwarded; it selects chunked framing downstream
//! - The gateway always closes after one transfer, so origin connection
//!   management headers never apply to the client connection

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// True for headers that describe the origin connection rather than the resource.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_names() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("keep-alive"));
        assert!(is_hop_by_hop("Upgrade"));
    }

    #[test]
    fn end_to_end_names_pass() {
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("set-cookie"));
    }
}
