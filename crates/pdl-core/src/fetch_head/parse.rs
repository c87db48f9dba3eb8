//! Parse raw response header lines.

use super::HeadResult;

/// Status code from an `HTTP/x.y NNN reason` line, or `None` for other lines.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.trim().split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Build a [`HeadResult`] from collected header lines. When redirects were
/// followed the lines hold several responses; only the last one counts.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let last_response = lines
        .iter()
        .rposition(|l| parse_status_line(l).is_some())
        .map_or(0, |i| i + 1);

    let mut head = HeadResult::default();
    for line in &lines[last_response..] {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "content-length" => head.content_length = value.parse().ok(),
            "accept-ranges" => head.accept_ranges = value.eq_ignore_ascii_case("bytes"),
            "etag" => {
                let tag = value.trim_start_matches("W/").trim_matches('"');
                if !tag.is_empty() {
                    head.etag = Some(tag.to_string());
                }
            }
            "content-disposition" => head.content_disposition = Some(value.to_string()),
            _ => {}
        }
    }
    head
}
