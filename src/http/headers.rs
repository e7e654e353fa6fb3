//! Response header synthesis.
//!
//! # Responsibilities
//! - Build the header set for a local file (also used per archive member)
//! - Build the header set for a remote passthrough, reconciling the origin's
//!   declared content type with the sniffed one
//! - Guarantee content type, disposition and CORS headers are present
//!
//! # Design Decisions
//! - Names are compared case-insensitively; each name appears once
//! - Origin headers take priority, except a content type contradicted by a
//!   specific sniffed type
//! - Repeated origin headers are merged into one comma-joined value

use url::Url;

use crate::http::mime::{self, FALLBACK_CONTENT_TYPE};
use crate::http::target::final_path_segment;
use crate::security::headers::is_hop_by_hop;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONNECTION: &str = "Connection";

/// Filename used when a URL has no usable final path segment.
const DEFAULT_DOWNLOAD_NAME: &str = "download";

/// Ordered header mapping with case-insensitive, unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaderSet {
    entries: Vec<(String, String)>,
}

impl ResponseHeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Value stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replace the value in place, or append a new entry.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((canonical_name(name), value)),
        }
    }

    /// Append only when `name` is not present yet.
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.entries.push((canonical_name(name), value.into()));
        }
    }

    /// Append, joining with any existing value as `a, b`.
    pub fn append_merged(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => self.entries.push((canonical_name(name), value.to_string())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the final transfer coding is `chunked`.
    pub fn declares_chunked(&self) -> bool {
        self.get(TRANSFER_ENCODING)
            .and_then(|codings| codings.rsplit(',').next())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
    }
}

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Last component of a slash-separated name.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(name)
}

/// `attachment; filename=<name>`, with control characters removed so a
/// crafted URL or member name cannot end the header line.
pub fn attachment(filename: &str) -> String {
    let filename: String = filename.chars().filter(|c| !c.is_control()).collect();
    let filename = if filename.is_empty() {
        DEFAULT_DOWNLOAD_NAME
    } else {
        filename.as_str()
    };
    format!("attachment; filename={filename}")
}

/// Headers for a file whose size is known up front.
pub fn for_local_file(name: &str, byte_size: u64) -> ResponseHeaderSet {
    let base = base_name(name);
    let mut headers = ResponseHeaderSet::new();
    headers.set(ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    headers.set(CONTENT_TYPE, mime::sniff(base));
    headers.set(CONTENT_LENGTH, byte_size.to_string());
    headers.set(CONTENT_DISPOSITION, attachment(base));
    headers
}

/// Headers for forwarding an origin response.
pub fn for_remote<'a, I>(origin_url: &Url, origin_headers: I) -> ResponseHeaderSet
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let filename = final_path_segment(origin_url);
    let sniffed = mime::sniff(&filename);

    let mut headers = ResponseHeaderSet::new();
    for (name, value) in origin_headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            headers.set(name, reconcile_content_type(value, sniffed));
        } else {
            headers.append_merged(name, value);
        }
    }

    if headers.declares_chunked() {
        headers.remove(CONTENT_LENGTH);
    }

    headers.insert_if_absent(CONTENT_TYPE, sniffed);
    headers.insert_if_absent(CONTENT_DISPOSITION, attachment(&filename));
    headers.insert_if_absent(ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    headers
}

/// Keep the declared type unless a specific sniffed type contradicts it.
fn reconcile_content_type(declared: &str, sniffed: &'static str) -> String {
    if sniffed != FALLBACK_CONTENT_TYPE && mime::essence(declared) != sniffed {
        sniffed.to_string()
    } else {
        declared.to_string()
    }
}
