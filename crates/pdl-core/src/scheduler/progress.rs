//! Progress reporting for a running download (bytes done, speed, ETA).

use crate::downloader::WorkerState;
use std::sync::Arc;

/// Aggregated snapshot over all workers of one attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressStats {
    /// Bytes on disk so far, including bytes resumed from a previous attempt.
    pub downloaded: u64,
    /// Total size when the server reported one.
    pub total: Option<u64>,
    /// Sum of the workers' instantaneous speeds, bytes/sec.
    pub speed: f64,
    /// Seconds since the attempt started.
    pub elapsed_secs: f64,
    pub workers_done: usize,
    pub worker_count: usize,
    /// True when more than one worker (ranged segments) is in use.
    pub segmented: bool,
}

impl ProgressStats {
    pub(crate) fn collect(
        states: &[Arc<WorkerState>],
        total: Option<u64>,
        elapsed_secs: f64,
        segmented: bool,
    ) -> Self {
        Self {
            downloaded: states.iter().map(|s| s.bytes_downloaded()).sum(),
            total,
            speed: states.iter().map(|s| s.speed()).sum(),
            elapsed_secs,
            workers_done: states.iter().filter(|s| s.is_completed()).count(),
            worker_count: states.len(),
            segmented,
        }
    }

    /// Fraction complete in [0.0, 1.0]; `None` when the size is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.downloaded as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    /// Estimated seconds remaining at the current speed.
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total?.saturating_sub(self.downloaded);
        if remaining == 0 {
            return Some(0.0);
        }
        if self.speed <= 0.0 {
            return None;
        }
        Some(remaining as f64 / self.speed)
    }
}

/// `HH:MM:SS` for a number of seconds (fractions truncated).
pub fn format_hms(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
