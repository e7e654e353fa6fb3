//! Target reference extraction.
//!
//! The request-target looks like `/<anything>?<target>`. Everything up to and
//! including the first `?` is routing prefix; the rest names either a file
//! under the data root or an absolute remote URL. A `?` inside the target's
//! own query is left alone because only the first one splits.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

/// Why a request-target carries no usable target reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("request path has no '?' separator before the target")]
    MissingSeparator,

    #[error("target reference after '?' is empty")]
    Empty,
}

/// The resource a single request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReference {
    raw: String,
    url: Option<Url>,
}

impl TargetReference {
    /// Text after the separator, exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Path probed under the data root.
    pub fn relative_path(&self) -> &str {
        self.raw.trim_start_matches('/')
    }

    /// Canonical absolute URL when the decoded target carries a scheme.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

impl fmt::Display for TargetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{url}"),
            None => f.write_str(&self.raw),
        }
    }
}

/// Split the request-target at its first `?` and classify what follows.
pub fn resolve(request_target: &str) -> Result<TargetReference, TargetError> {
    let (_, raw) = request_target
        .split_once('?')
        .ok_or(TargetError::MissingSeparator)?;
    if raw.is_empty() {
        return Err(TargetError::Empty);
    }

    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    // Url::parse re-encodes the path and keeps the query from its own parse.
    let url = Url::parse(&decoded)
        .ok()
        .filter(|url| !url.scheme().is_empty());

    Ok(TargetReference {
        raw: raw.to_string(),
        url,
    })
}

/// Last non-empty path segment of a URL, percent-decoded.
pub fn final_path_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .unwrap_or_default()
}
