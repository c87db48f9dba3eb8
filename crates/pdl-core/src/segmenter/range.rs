//! Segment type and byte-range partitioning.

use std::path::PathBuf;

/// One planned byte range of the remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    /// First byte (inclusive).
    pub start: u64,
    /// Last byte (inclusive); `end + 1` is the next segment's `start`.
    pub end: u64,
    /// Bytes this segment's file holds once complete.
    pub size: u64,
    /// Where this segment's bytes are written (`<file>.<index>`).
    pub path: PathBuf,
}

impl Segment {
    /// Inclusive range still missing when `have` bytes are already on disk,
    /// or `None` when the segment is complete.
    pub fn remaining_range(&self, have: u64) -> Option<(u64, u64)> {
        if have >= self.size {
            None
        } else {
            Some((self.start + have, self.end))
        }
    }
}

/// Splits `total_size` bytes into `segment_count` contiguous ranges.
///
/// Segment `i` covers `[floor(total*i/n), floor(total*(i+1)/n))`, so sizes
/// differ by at most one byte and the last range ends on the final byte.
/// Returns `(start, end_inclusive, size)` triples; empty when either input is 0.
pub fn partition(total_size: u64, segment_count: usize) -> Vec<(u64, u64, u64)> {
    if total_size == 0 || segment_count == 0 {
        return Vec::new();
    }
    let n = segment_count as u128;
    let total = total_size as u128;
    let boundary = |i: u128| (total * i / n) as u64;

    (0..n)
        .map(|i| {
            let start = boundary(i);
            let stop = boundary(i + 1);
            (start, stop.saturating_sub(1), stop - start)
        })
        .collect()
}
