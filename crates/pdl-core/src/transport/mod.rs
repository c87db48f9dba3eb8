//! HTTP transport capability used by the download engine.
//!
//! The engine needs two things from the network: a metadata probe (HEAD) and a
//! streaming GET that hands body bytes to a callback chunk by chunk. The
//! callback decides after each chunk whether to keep reading.

mod http;
pub mod memory;

pub use http::{CurlOptions, CurlTransport};
pub use memory::MemoryTransport;

use crate::fetch_head::HeadResult;
use std::collections::BTreeMap;

/// Returned by the chunk callback after each chunk is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    Continue,
    /// Close the stream; the transfer ends normally.
    Stop,
}

/// Failure of the transport while probing or streaming.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Status(u32),
    /// Server answered a ranged GET with the full body.
    #[error("server ignored Range {0}")]
    RangeIgnored(String),
    #[error("{0}")]
    Other(String),
}

/// Immutable request description. Workers derive ranged copies with
/// [`Request::with_range`]; the base request shared between workers is never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Inclusive byte range, sent as `Range: bytes=start-end`.
    pub range: Option<(u64, u64)>,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            range: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Copy of this request restricted to the inclusive range `[start, end]`.
    pub fn with_range(&self, start: u64, end: u64) -> Self {
        Self {
            range: Some((start, end)),
            ..self.clone()
        }
    }

    /// `Range` header value, if this request is ranged.
    pub fn range_header_value(&self) -> Option<String> {
        self.range.map(|(start, end)| format!("bytes={}-{}", start, end))
    }
}

/// Network capability required by the engine. Implementations must be
/// shareable between worker threads.
pub trait Transport: Send + Sync {
    /// Fetch response metadata without the body.
    fn head(&self, request: &Request) -> Result<HeadResult, TransportError>;

    /// Stream the response body of a GET into `on_chunk`. Returns `Ok(())` when
    /// the body is exhausted or the callback returned [`ChunkControl::Stop`].
    fn stream_get(
        &self,
        request: &Request,
        on_chunk: &mut dyn FnMut(&[u8]) -> ChunkControl,
    ) -> Result<(), TransportError>;
}
