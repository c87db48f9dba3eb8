//! Segment planning.
//!
//! Turns a total size and a requested segment count into a [`SegmentTable`],
//! reusing the segment count of a prior attempt when its sidecar still
//! describes the same remote resource.

mod range;
mod sidecar;

pub use range::{partition, Segment};
pub use sidecar::{ProgressRecord, SegmentEntry};

use sidecar::PlanHeader;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use crate::storage::{segment_path, sidecar_path};

const MIB: u64 = 1_048_576;

/// Files below this size are never split into more than [`SMALL_FILE_SEGMENTS`].
pub const SMALL_FILE_LIMIT: u64 = 50 * MIB;
pub const SMALL_FILE_SEGMENTS: usize = 5;

/// Plan for one download attempt. Segments are ordered by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTable {
    pub url: String,
    pub total_size: u64,
    pub segments: Vec<Segment>,
}

impl SegmentTable {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Sidecar form of this plan.
    pub fn to_record(&self, etag: Option<&str>) -> ProgressRecord {
        let table: BTreeMap<String, SegmentEntry> = self
            .segments
            .iter()
            .map(|s| {
                (
                    s.index.to_string(),
                    SegmentEntry {
                        start: s.start,
                        end: s.end,
                        segment_size: s.size,
                        segment_path: s.path.to_string_lossy().into_owned(),
                    },
                )
            })
            .collect();
        ProgressRecord {
            url: self.url.clone(),
            etag: etag.map(str::to_string),
            segments: self.segment_count(),
            table,
        }
    }
}

/// Caps the segment count for small files.
pub fn clamp_segments(requested: usize, total_size: u64) -> usize {
    if requested > SMALL_FILE_SEGMENTS && total_size < SMALL_FILE_LIMIT {
        SMALL_FILE_SEGMENTS
    } else {
        requested
    }
}

/// Builds the segment table for `file_path` and writes its sidecar.
///
/// A prior sidecar is honored only when it names the same `url` and the same
/// non-empty `etag`; anything else (missing, unreadable, mismatched) falls back
/// to the freshly clamped `requested` count. The count is finally bounded to
/// `1..=total_size` so no segment is empty.
///
/// Segment files of a sidecar that is not honored survive only where they can
/// still be resumed: the resource is not known to have changed and the file's
/// recorded range equals its range in the new plan.
pub fn plan(
    url: &str,
    file_path: &Path,
    requested: usize,
    total_size: u64,
    etag: Option<&str>,
) -> Result<SegmentTable> {
    anyhow::ensure!(total_size > 0, "cannot plan segments for an empty resource");

    let sidecar = sidecar_path(file_path);
    let prior = sidecar::read_header(&sidecar);
    let reusable = match (etag, &prior) {
        (Some(tag), Some(p)) => p.url == url && p.etag.as_deref() == Some(tag),
        _ => false,
    };

    let count = match &prior {
        Some(p) if reusable => {
            tracing::debug!(segments = p.segments, "reusing prior plan from sidecar");
            p.segments
        }
        _ => clamp_segments(requested, total_size),
    };
    let count = count.clamp(1, usize::try_from(total_size).unwrap_or(usize::MAX));

    let segments = partition(total_size, count)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end, size))| Segment {
            index,
            start,
            end,
            size,
            path: segment_path(file_path, index),
        })
        .collect();
    let table = SegmentTable {
        url: url.to_string(),
        total_size,
        segments,
    };

    if let Some(prior) = prior.filter(|_| !reusable) {
        tracing::debug!("sidecar does not match this request; planning afresh");
        let changed = matches!(
            (etag, prior.etag.as_deref()),
            (Some(new), Some(old)) if new != old
        );
        discard_stale_segments(&table, &prior, changed, file_path)?;
    }

    table.to_record(etag).save(&sidecar)?;
    Ok(table)
}

/// Removes segment files that cannot continue under `table`: all of them when
/// the resource `changed`, otherwise those whose recorded range moved or that
/// the new plan no longer has.
fn discard_stale_segments(
    table: &SegmentTable,
    prior: &PlanHeader,
    changed: bool,
    file_path: &Path,
) -> std::io::Result<()> {
    for index in 0..prior.segments.max(table.segment_count()) {
        let keep = !changed
            && table
                .segments
                .get(index)
                .map_or(false, |s| prior.recorded_range(index) == Some((s.start, s.end)));
        if keep {
            continue;
        }
        match std::fs::remove_file(segment_path(file_path, index)) {
            Ok(()) => tracing::debug!(index, "removed stale segment file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.com/f.bin";

    #[test]
    fn small_files_are_capped_at_five() {
        assert_eq!(clamp_segments(8, 10 * MIB), 5);
        assert_eq!(clamp_segments(5, 10 * MIB), 5);
        assert_eq!(clamp_segments(3, 10 * MIB), 3);
        assert_eq!(clamp_segments(8, 50 * MIB), 8);
        assert_eq!(clamp_segments(16, 200 * MIB), 16);
    }

    #[test]
    fn plan_clamps_and_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        let table = plan(URL, &file, 8, 10 * MIB, Some("v1")).unwrap();
        assert_eq!(table.segment_count(), 5);
        assert_eq!(table.segments.iter().map(|s| s.size).sum::<u64>(), 10 * MIB);

        let record = ProgressRecord::load(&sidecar_path(&file)).unwrap();
        assert_eq!(record.url, URL);
        assert_eq!(record.etag.as_deref(), Some("v1"));
        assert_eq!(record.segments, 5);
        assert_eq!(record.entries().len(), 5);
    }

    #[test]
    fn hundred_bytes_four_segments() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        let table = plan(URL, &file, 4, 100, None).unwrap();
        let ranges: Vec<_> = table.segments.iter().map(|s| (s.start, s.end, s.size)).collect();
        assert_eq!(
            ranges,
            vec![(0, 24, 25), (25, 49, 25), (50, 74, 25), (75, 99, 25)]
        );
        assert_eq!(table.segments[2].path, dir.path().join("f.bin.2"));
        assert_eq!(table.segments[2].index, 2);
    }

    #[test]
    fn matching_sidecar_keeps_prior_count() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        plan(URL, &file, 3, 1000, Some("v1")).unwrap();
        let table = plan(URL, &file, 4, 1000, Some("v1")).unwrap();
        assert_eq!(table.segment_count(), 3);
    }

    #[test]
    fn etag_mismatch_plans_afresh() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        plan(URL, &file, 3, 1000, Some("v1")).unwrap();
        let table = plan(URL, &file, 4, 1000, Some("v2")).unwrap();
        assert_eq!(table.segment_count(), 4);
        let record = ProgressRecord::load(&sidecar_path(&file)).unwrap();
        assert_eq!(record.etag.as_deref(), Some("v2"));
        assert_eq!(record.segments, 4);
    }

    #[test]
    fn mismatch_removes_segment_files_of_the_old_plan() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        plan(URL, &file, 3, 1000, Some("v1")).unwrap();
        std::fs::write(segment_path(&file, 0), b"old bytes").unwrap();
        std::fs::write(segment_path(&file, 2), b"old").unwrap();

        plan(URL, &file, 3, 1000, Some("v2")).unwrap();
        assert!(!segment_path(&file, 0).exists());
        assert!(!segment_path(&file, 2).exists());
    }

    #[test]
    fn missing_etag_keeps_files_of_an_identical_layout() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        plan(URL, &file, 4, 1000, None).unwrap();
        std::fs::write(segment_path(&file, 1), b"partial").unwrap();

        let table = plan(URL, &file, 4, 1000, None).unwrap();
        assert_eq!(table.segment_count(), 4);
        assert_eq!(std::fs::read(segment_path(&file, 1)).unwrap(), b"partial");
    }

    #[test]
    fn other_url_with_same_layout_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        plan(URL, &file, 4, 1000, Some("v1")).unwrap();
        std::fs::write(segment_path(&file, 2), b"partial").unwrap();

        plan("http://mirror.example.com/f.bin", &file, 4, 1000, Some("v1")).unwrap();
        assert!(segment_path(&file, 2).exists());
    }

    #[test]
    fn moved_ranges_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        // 1000 bytes in 4: [0,249] [250,499] [500,749] [750,999]
        plan(URL, &file, 4, 1000, None).unwrap();
        for i in 0..4 {
            std::fs::write(segment_path(&file, i), b"x").unwrap();
        }

        // in 2: [0,499] [500,999]; only segment 0 keeps its start, and its end moved
        let table = plan(URL, &file, 2, 1000, None).unwrap();
        assert_eq!(table.segment_count(), 2);
        for i in 0..4 {
            assert!(!segment_path(&file, i).exists(), "segment {} should be gone", i);
        }
    }

    #[test]
    fn url_mismatch_or_missing_etag_plans_afresh() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        plan(URL, &file, 3, 1000, Some("v1")).unwrap();
        assert_eq!(
            plan("http://other/f.bin", &file, 4, 1000, Some("v1"))
                .unwrap()
                .segment_count(),
            4
        );

        plan(URL, &file, 3, 1000, None).unwrap();
        assert_eq!(plan(URL, &file, 4, 1000, None).unwrap().segment_count(), 4);
    }

    #[test]
    fn corrupt_sidecar_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        std::fs::write(sidecar_path(&file), "{ not json").unwrap();
        let table = plan(URL, &file, 2, 1000, Some("v1")).unwrap();
        assert_eq!(table.segment_count(), 2);
        assert_eq!(ProgressRecord::load(&sidecar_path(&file)).unwrap().segments, 2);
    }

    #[test]
    fn tiny_resources_get_one_byte_segments_at_most() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        let table = plan(URL, &file, 4, 3, None).unwrap();
        assert_eq!(table.segment_count(), 3);
        assert!(table.segments.iter().all(|s| s.size == 1));

        assert_eq!(plan(URL, &file, 0, 10, None).unwrap().segment_count(), 1);
        assert!(plan(URL, &file, 4, 0, None).is_err());
    }
}
