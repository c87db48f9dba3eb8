//! Minimal HTTP/1.1 server with HEAD and Range GET support for integration tests.
//!
//! Serves one static body. HEAD answers with Content-Length, optionally
//! Accept-Ranges, ETag and Content-Disposition; GET with a Range answers 206.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and HEAD omits `Accept-Ranges`.
    pub support_ranges: bool,
    pub etag: Option<String>,
    pub content_disposition: Option<String>,
}

impl RangeServerOptions {
    pub fn ranged() -> Self {
        Self {
            support_ranges: true,
            ..Self::default()
        }
    }
}

/// Handle on a running server: base URL plus the Range headers it has seen.
pub struct RangeServer {
    pub url: String,
    ranges: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl RangeServer {
    /// Ranges requested so far, sorted by start offset.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        let mut r = self.ranges.lock().unwrap().clone();
        r.sort_unstable();
        r
    }
}

/// Starts a range-capable server in a background thread serving `body`.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::ranged())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&ranges);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &body, &opts, &seen));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/files/payload.bin", port),
        ranges,
    }
}

fn common_headers(opts: &RangeServerOptions) -> String {
    let mut out = String::new();
    if opts.support_ranges {
        out.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(etag) = &opts.etag {
        out.push_str(&format!("ETag: \"{}\"\r\n", etag));
    }
    if let Some(cd) = &opts.content_disposition {
        out.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }
    out
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    seen: &Mutex<Vec<(u64, u64)>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
            total,
            common_headers(opts)
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let (status, content_range, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            seen.lock().unwrap().push((start, end_incl));
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                ("416 Range Not Satisfiable", format!("bytes */{}", total), &body[0..0])
            } else {
                (
                    "206 Partial Content",
                    format!("bytes {}-{}/{}", start, end_incl, total),
                    &body[start as usize..=end_incl as usize],
                )
            }
        }
        None => (
            "200 OK",
            format!("bytes 0-{}/{}", total.saturating_sub(1), total),
            body,
        ),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Range: {}\r\n{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        content_range,
        common_headers(opts)
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let range = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| value.trim().strip_prefix("bytes="))
        .and_then(|spec| spec.split_once('-'))
        .map(|(a, b)| {
            let start = a.trim().parse::<u64>().unwrap_or(0);
            let end = b.trim().parse::<u64>().unwrap_or(u64::MAX);
            (start, end)
        });
    (method, range)
}
