//! Cooperative cancellation shared by every worker of one download attempt.
//!
//! Any worker that hits an unrecoverable error sets the signal; every worker
//! checks it once per received chunk and the coordinator checks it on each
//! poll. The flag only ever goes from clear to set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag for one download attempt. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    flag: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every worker of this attempt to stop after its current chunk.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Error returned when a download ended without producing the final file.
/// Partial segment files and the sidecar are left for the next attempt.
#[derive(Debug, thiserror::Error)]
#[error("download incomplete (resumable)")]
pub struct DownloadAborted;
