//! Destination path resolution.
//!
//! The local filename comes from `Content-Disposition` when the server sends
//! one, otherwise from the last URL path segment, and is made safe for a
//! Linux filesystem before use.

use std::path::{Path, PathBuf};

/// Used when neither the header nor the URL yields a usable name.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Where to save `url`. A `target` directory receives the derived filename; any
/// other `target` is used as the file path as given; no target means the
/// derived filename relative to the working directory.
pub fn resolve_file_path(url: &str, content_disposition: Option<&str>, target: Option<&Path>) -> PathBuf {
    match target {
        Some(dir) if dir.is_dir() => dir.join(derive_filename(url, content_disposition)),
        Some(file) => file.to_path_buf(),
        None => PathBuf::from(derive_filename(url, content_disposition)),
    }
}

/// Safe filename for `url`, preferring the `Content-Disposition` hint.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(filename_from_content_disposition)
        .or_else(|| filename_from_url(url))
        .map(|raw| sanitize_filename(&raw))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// `filename*=UTF-8''...` wins over `filename=`; both are percent-decoded.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';') {
        let Some((name, v)) = param.trim().split_once('=') else {
            continue;
        };
        let v = v.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let utf8 = v.get(..7).map_or(false, |p| p.eq_ignore_ascii_case("utf-8''"));
                let encoded = v.get(7..).filter(|_| utf8);
                if let Some(name) = encoded.map(percent_decode).filter(|n| !n.is_empty()) {
                    return Some(name);
                }
            }
            "filename" => {
                let unquoted = v.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(v);
                let decoded = percent_decode(&unquoted.replace("\\\"", "\""));
                if !decoded.is_empty() {
                    plain = Some(decoded);
                }
            }
            _ => {}
        }
    }
    plain
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(percent_decode(last))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (bytes[i], hex) {
            (b'%', Some(b)) => {
                out.push(b);
                i += 3;
            }
            (b, _) => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Replaces path separators, NUL and control characters with `_` and trims
/// leading/trailing dots and whitespace. `.` and `..` become empty.
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;
    let replaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
