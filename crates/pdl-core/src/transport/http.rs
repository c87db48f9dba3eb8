//! libcurl-backed transport (one `Easy` handle per request).

use std::cell::Cell;
use std::str;
use std::time::Duration;

use super::{ChunkControl, Request, Transport, TransportError};
use crate::fetch_head::{parse_headers, parse_status_line, HeadResult};

/// Tuning knobs applied to every curl handle.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below this many bytes/sec for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Receive buffer size; bounds the size of each delivered chunk.
    pub buffer_size: Option<usize>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            buffer_size: None,
        }
    }
}

/// Blocking HTTP transport. Safe to share between worker threads since each
/// call builds its own handle.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }

    fn easy(&self, request: &Request) -> Result<curl::easy::Easy, TransportError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(&request.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(self.options.low_speed_limit)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        if let Some(size) = self.options.buffer_size {
            easy.buffer_size(size)?;
        }

        if !request.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &request.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        // curl takes "start-end" (inclusive) without the "bytes=" unit.
        if let Some((start, end)) = request.range {
            easy.range(&format!("{}-{}", start, end))?;
        }
        Ok(easy)
    }
}

/// Reject error statuses, and full-body answers to a ranged request that does
/// not start at byte 0 (appending those would corrupt the segment file).
fn check_status(code: u32, request: &Request) -> Result<(), TransportError> {
    if !(200..300).contains(&code) {
        return Err(TransportError::Status(code));
    }
    match request.range {
        Some((start, _)) if code != 206 && start > 0 => Err(TransportError::RangeIgnored(
            request.range_header_value().unwrap_or_default(),
        )),
        _ => Ok(()),
    }
}

impl Transport for CurlTransport {
    fn head(&self, request: &Request) -> Result<HeadResult, TransportError> {
        let mut lines: Vec<String> = Vec::new();
        let mut easy = self.easy(request)?;
        easy.nobody(true)?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(TransportError::Status(code));
        }
        Ok(parse_headers(&lines))
    }

    fn stream_get(
        &self,
        request: &Request,
        on_chunk: &mut dyn FnMut(&[u8]) -> ChunkControl,
    ) -> Result<(), TransportError> {
        let mut easy = self.easy(request)?;
        let status = Cell::new(0u32);
        let mut rejected: Option<TransportError> = None;
        let mut stopped = false;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Some(code) = str::from_utf8(data).ok().and_then(parse_status_line) {
                    status.set(code);
                }
                true
            })?;
            transfer.write_function(|data| {
                if let Err(e) = check_status(status.get(), request) {
                    rejected = Some(e);
                    return Ok(0);
                }
                match on_chunk(data) {
                    ChunkControl::Continue => Ok(data.len()),
                    ChunkControl::Stop => {
                        stopped = true;
                        Ok(0)
                    }
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = rejected {
            return Err(e);
        }
        match performed {
            Err(e) if stopped && e.is_write_error() => return Ok(()),
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }
        // Bodies without any bytes never reach the write callback.
        check_status(easy.response_code()?, request)
    }
}
