//! Response metadata needed before planning a download.
//!
//! `Content-Length` and `Accept-Ranges: bytes` decide between segmented and
//! whole-file mode; `ETag` keys the resume sidecar; `Content-Disposition`
//! feeds filename derivation.

mod parse;

pub(crate) use parse::{parse_headers, parse_status_line};

/// Key headers of a probe response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `ETag` value with surrounding quotes removed.
    pub etag: Option<String>,
    /// `Content-Disposition` value if present (filename hint).
    pub content_disposition: Option<String>,
}

impl HeadResult {
    /// Whether the resource can be split into ranged segments.
    pub fn supports_segments(&self) -> bool {
        self.accept_ranges && self.content_length.map_or(false, |n| n > 0)
    }
}
