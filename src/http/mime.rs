//! Content type sniffing from file names.
//!
//! Only the name is consulted, never the bytes.

/// Type reported for any name the table does not know.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const SUFFIX_TABLE: &[(&str, &str)] = &[
    (".jpg", "image/jpg"),
    (".png", "image/png"),
    (".csv", "text/csv"),
    (".json", "application/json"),
];

/// Map a file name to a content type by case-insensitive suffix.
pub fn sniff(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    SUFFIX_TABLE
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// The media type of a header value without parameters, lowercased.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
