//! Resumable download of one planned byte range into its segment file.

use std::sync::Arc;

use super::{chunked_transfer, TransferContext, TransferEnd, Worker, WorkerError, WorkerState, WriteMode};
use crate::segmenter::Segment;
use crate::transport::Request;

pub struct SegmentWorker {
    base: Request,
    segment: Segment,
    state: Arc<WorkerState>,
}

impl SegmentWorker {
    /// `base` is the shared request; the worker derives its own ranged copy.
    pub fn new(base: Request, segment: Segment) -> Self {
        let state = Arc::new(WorkerState::new(segment.index));
        Self {
            base,
            segment,
            state,
        }
    }

    /// Bytes of a usable partial file. A file larger than the planned size
    /// was written under a different plan and is deleted.
    fn resume_offset(&self) -> std::io::Result<u64> {
        let path = &self.segment.path;
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.segment.size => {
                tracing::debug!(
                    worker = self.segment.index,
                    on_disk = meta.len(),
                    planned = self.segment.size,
                    "discarding oversized segment file"
                );
                std::fs::remove_file(path)?;
                Ok(0)
            }
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl Worker for SegmentWorker {
    fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.state)
    }

    /// Downloads whatever part of the segment is still missing. Marks the
    /// state completed only when the file holds exactly the planned size.
    fn run(&self, ctx: &TransferContext<'_>) {
        let id = self.segment.index;
        let have = match self.resume_offset() {
            Ok(n) => n,
            Err(e) => {
                ctx.abort(id, &WorkerError::Io(e));
                return;
            }
        };
        self.state.set_bytes(have);

        if let Some((from, to)) = self.segment.remaining_range(have) {
            if ctx.cancel.is_set() {
                return;
            }
            if have > 0 {
                tracing::debug!(worker = id, resume_at = from, "resuming segment");
            }
            let request = self.base.with_range(from, to);
            let end = chunked_transfer(ctx, &request, &self.segment.path, WriteMode::Append, &self.state);
            if end != TransferEnd::Exhausted {
                return;
            }
        }

        let got = self.state.bytes_downloaded();
        if got == self.segment.size {
            self.state.mark_completed();
        } else {
            tracing::warn!(
                worker = id,
                got,
                expected = self.segment.size,
                "segment stream ended at the wrong size"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancellationSignal;
    use crate::transport::{MemoryTransport, Transport};
    use std::path::Path;
    use std::time::Duration;

    fn body() -> Vec<u8> {
        (0u8..100).collect()
    }

    fn segment(dir: &Path) -> Segment {
        Segment {
            index: 1,
            start: 25,
            end: 49,
            size: 25,
            path: dir.join("f.bin.1"),
        }
    }

    fn run(worker: &SegmentWorker, transport: &dyn Transport, cancel: &CancellationSignal) {
        worker.run(&TransferContext {
            transport,
            cancel,
            abort_grace: Duration::ZERO,
        });
    }

    #[test]
    fn fresh_segment_downloads_its_range() {
        let dir = tempfile::tempdir().unwrap();
        let t = MemoryTransport::new(body()).with_chunks(8, Duration::ZERO);
        let worker = SegmentWorker::new(Request::new("mem://f"), segment(dir.path()));
        run(&worker, &t, &CancellationSignal::new());

        assert_eq!(t.requested_ranges(), vec![(25, 49)]);
        assert!(worker.state().is_completed());
        assert_eq!(worker.state().bytes_downloaded(), 25);
        assert_eq!(std::fs::read(dir.path().join("f.bin.1")).unwrap(), body()[25..50].to_vec());
    }

    #[test]
    fn partial_file_resumes_from_its_length() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment(dir.path());
        std::fs::write(&seg.path, &body()[25..35]).unwrap();
        let t = MemoryTransport::new(body());
        let worker = SegmentWorker::new(Request::new("mem://f"), seg.clone());
        let state = worker.state();
        run(&worker, &t, &CancellationSignal::new());

        assert_eq!(t.requested_ranges(), vec![(35, 49)]);
        assert!(state.is_completed());
        assert_eq!(state.bytes_downloaded(), 25);
        assert_eq!(std::fs::read(&seg.path).unwrap(), body()[25..50].to_vec());
    }

    #[test]
    fn partial_file_counts_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment(dir.path());
        std::fs::write(&seg.path, &body()[25..32]).unwrap();
        let t = MemoryTransport::new(body());
        let cancel = CancellationSignal::new();
        cancel.set();
        let worker = SegmentWorker::new(Request::new("mem://f"), seg);
        run(&worker, &t, &cancel);

        assert_eq!(worker.state().bytes_downloaded(), 7);
        assert!(!worker.state().is_completed());
        assert!(t.requests().is_empty());
    }

    #[test]
    fn oversized_file_is_discarded_and_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment(dir.path());
        std::fs::write(&seg.path, vec![0xAA; 40]).unwrap();
        let t = MemoryTransport::new(body());
        let worker = SegmentWorker::new(Request::new("mem://f"), seg.clone());
        run(&worker, &t, &CancellationSignal::new());

        assert_eq!(t.requested_ranges(), vec![(25, 49)]);
        assert!(worker.state().is_completed());
        assert_eq!(std::fs::read(&seg.path).unwrap(), body()[25..50].to_vec());
    }

    #[test]
    fn complete_file_needs_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment(dir.path());
        std::fs::write(&seg.path, &body()[25..50]).unwrap();
        let t = MemoryTransport::new(body());
        let worker = SegmentWorker::new(Request::new("mem://f"), seg);
        run(&worker, &t, &CancellationSignal::new());

        assert!(t.requests().is_empty());
        assert!(worker.state().is_completed());
    }

    #[test]
    fn failure_keeps_partial_data_and_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment(dir.path());
        let t = MemoryTransport::new(body())
            .with_chunks(5, Duration::ZERO)
            .failing_at(25, 2);
        let cancel = CancellationSignal::new();
        let worker = SegmentWorker::new(Request::new("mem://f"), seg.clone());
        run(&worker, &t, &cancel);

        assert!(cancel.is_set());
        assert!(!worker.state().is_completed());
        assert_eq!(std::fs::read(&seg.path).unwrap(), body()[25..35].to_vec());
    }
}
