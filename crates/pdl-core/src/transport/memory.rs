//! In-process transport serving a fixed body, used by the unit and
//! integration tests.
//!
//! Records every request it receives, can slow chunk delivery down, and can be
//! told to fail a GET after a number of chunks.

use std::sync::Mutex;
use std::time::Duration;

use super::{ChunkControl, Request, Transport, TransportError};
use crate::fetch_head::HeadResult;

/// Fail the GET whose range starts at `range_start` after `after_chunks` chunks.
#[derive(Debug, Clone, Copy)]
struct FailRule {
    range_start: u64,
    after_chunks: usize,
}

pub struct MemoryTransport {
    body: Vec<u8>,
    etag: Option<String>,
    accept_ranges: bool,
    chunk_size: usize,
    chunk_delay: Duration,
    fail_rules: Vec<FailRule>,
    requests: Mutex<Vec<Request>>,
}

impl MemoryTransport {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            etag: None,
            accept_ranges: true,
            chunk_size: 16 * 1024,
            chunk_delay: Duration::ZERO,
            fail_rules: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    pub fn without_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }

    pub fn with_chunks(mut self, chunk_size: usize, delay: Duration) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_delay = delay;
        self
    }

    /// Make the GET whose range starts at `range_start` (0 for unranged GETs)
    /// fail after delivering `after_chunks` chunks.
    pub fn failing_at(mut self, range_start: u64, after_chunks: usize) -> Self {
        self.fail_rules.push(FailRule {
            range_start,
            after_chunks,
        });
        self
    }

    /// Requests received so far (HEAD and GET), in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Ranges of the GET requests received so far, sorted by start offset.
    pub fn requested_ranges(&self) -> Vec<(u64, u64)> {
        let mut ranges: Vec<_> = self.requests().iter().filter_map(|r| r.range).collect();
        ranges.sort_unstable();
        ranges
    }

    fn record(&self, request: &Request) {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
    }
}

impl Transport for MemoryTransport {
    fn head(&self, request: &Request) -> Result<HeadResult, TransportError> {
        self.record(request);
        Ok(HeadResult {
            content_length: Some(self.body.len() as u64),
            accept_ranges: self.accept_ranges,
            etag: self.etag.clone(),
            content_disposition: None,
        })
    }

    fn stream_get(
        &self,
        request: &Request,
        on_chunk: &mut dyn FnMut(&[u8]) -> ChunkControl,
    ) -> Result<(), TransportError> {
        self.record(request);
        let total = self.body.len() as u64;
        let (start, end_excl) = match request.range {
            Some(_) if !self.accept_ranges => (0, total),
            Some((start, end)) if start >= total || start > end => {
                return Err(TransportError::Status(416));
            }
            Some((start, end)) => (start, end.saturating_add(1).min(total)),
            None => (0, total),
        };
        let fail = self
            .fail_rules
            .iter()
            .find(|rule| rule.range_start == request.range.map_or(0, |r| r.0));

        let body = &self.body[start as usize..end_excl as usize];
        for (delivered, chunk) in body.chunks(self.chunk_size).enumerate() {
            if let Some(rule) = fail {
                if delivered == rule.after_chunks {
                    return Err(TransportError::Other("connection reset by peer".into()));
                }
            }
            if !self.chunk_delay.is_zero() {
                std::thread::sleep(self.chunk_delay);
            }
            if on_chunk(chunk) == ChunkControl::Stop {
                break;
            }
        }
        Ok(())
    }
}
