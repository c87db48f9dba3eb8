//! Download coordinator.
//!
//! Drives one download attempt through
//! `Planning -> Running -> {Combining -> Done} | Aborted`:
//! probe → destination → segmenter → workers (one thread each) → storage combine.
//! An aborted attempt leaves segment files and the sidecar in place so the next
//! attempt on the same destination resumes.

mod progress;
mod run;

pub use progress::{format_hms, ProgressStats};
pub use run::Downloader;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// ETag used to key the sidecar when validation is turned off, so any prior
/// plan for the same URL is reused.
pub const UNCHECKED_ETAG: &str = "*";

/// Per-attempt settings.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Requested number of segments (may be clamped by the planner).
    pub segments: usize,
    /// Allow ranged segments; when false the whole body is streamed once.
    pub multi_segment: bool,
    /// Only resume a prior plan when the server's ETag matches it.
    pub check_etag: bool,
    /// Extra request headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// How often the coordinator aggregates worker state.
    pub poll_interval: Duration,
    /// Pause of a failing worker after it sets the cancellation signal.
    pub abort_grace: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            segments: 10,
            multi_segment: true,
            check_etag: true,
            headers: BTreeMap::new(),
            poll_interval: Duration::from_millis(150),
            abort_grace: Duration::from_secs(1),
        }
    }
}

/// States of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Running,
    Combining,
    Done,
    Aborted,
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The final file is in place.
    Completed,
    /// Stopped before every worker completed; resumable.
    Aborted,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Bytes in the final file, or bytes on disk so far when aborted.
    pub bytes: u64,
    /// Whether ranged segments were used.
    pub segmented: bool,
    pub elapsed: Duration,
}
