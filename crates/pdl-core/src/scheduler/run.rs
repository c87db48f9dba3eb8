//! One download attempt, end to end.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::{DownloadOptions, DownloadReport, Outcome, Phase, ProgressStats, UNCHECKED_ETAG};
use crate::control::CancellationSignal;
use crate::downloader::{SegmentWorker, TransferContext, WholeFileWorker, Worker};
use crate::segmenter;
use crate::storage;
use crate::transport::{Request, Transport};
use crate::url_model;

/// Runs download attempts over a shared transport.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    options: DownloadOptions,
}

fn enter(phase: Phase, path: &Path) {
    tracing::debug!(?phase, path = %path.display(), "download phase");
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, options: DownloadOptions) -> Self {
        Self { transport, options }
    }

    /// Downloads `url` to `target` (a file path, a directory, or the working
    /// directory when `None`). Blocks until the attempt is done or aborted;
    /// setting `cancel` from another thread stops it cooperatively.
    ///
    /// Progress snapshots are sent on `progress` every poll interval and once
    /// more at the end; a full channel just drops the snapshot.
    ///
    /// Returns `Err` when the probe, planning or combine step fails. A worker
    /// failure or cancellation is not an error: the report says
    /// [`Outcome::Aborted`] and the partial state stays on disk.
    pub fn download(
        &self,
        url: &str,
        target: Option<&Path>,
        cancel: &CancellationSignal,
        progress: Option<&tokio::sync::mpsc::Sender<ProgressStats>>,
    ) -> Result<DownloadReport> {
        let started = Instant::now();
        let base = Request::new(url).with_headers(self.options.headers.clone());
        let head = self
            .transport
            .head(&base)
            .with_context(|| format!("probe {}", url))?;

        let path = url_model::resolve_file_path(url, head.content_disposition.as_deref(), target);
        enter(Phase::Planning, &path);
        let total = head.content_length;
        let segmented =
            self.options.multi_segment && self.options.segments > 1 && head.supports_segments();

        let mut segment_count = 0;
        let workers: Vec<Box<dyn Worker>> = match total.filter(|_| segmented) {
            Some(total_size) => {
                let etag = if self.options.check_etag {
                    head.etag.as_deref()
                } else {
                    Some(UNCHECKED_ETAG)
                };
                let table = segmenter::plan(url, &path, self.options.segments, total_size, etag)
                    .with_context(|| format!("plan segments for {}", path.display()))?;
                segment_count = table.segment_count();
                tracing::info!(segments = segment_count, total_size, "segmented download of {}", url);
                table
                    .segments
                    .into_iter()
                    .map(|s| Box::new(SegmentWorker::new(base.clone(), s)) as Box<dyn Worker>)
                    .collect()
            }
            None => {
                tracing::info!("single-stream download of {}", url);
                vec![Box::new(WholeFileWorker::new(base.clone(), path.clone())) as Box<dyn Worker>]
            }
        };
        let segmented = segment_count > 0;

        enter(Phase::Running, &path);
        let states: Vec<_> = workers.iter().map(|w| w.state()).collect();
        let snapshot = || ProgressStats::collect(&states, total, started.elapsed().as_secs_f64(), segmented);
        let send = |stats: ProgressStats| {
            if let Some(tx) = progress {
                let _ = tx.try_send(stats);
            }
        };

        let handles = self.spawn(workers, cancel)?;
        loop {
            send(snapshot());
            let all_completed = states.iter().all(|s| s.is_completed());
            let all_exited = handles.iter().all(|h| h.is_finished());
            if all_completed || cancel.is_set() || all_exited {
                break;
            }
            thread::sleep(self.options.poll_interval);
        }
        for handle in handles {
            if handle.join().is_err() {
                cancel.set();
                tracing::error!("download worker panicked");
            }
        }
        let last = snapshot();
        let downloaded = last.downloaded;
        send(last);

        if !states.iter().all(|s| s.is_completed()) {
            enter(Phase::Aborted, &path);
            tracing::warn!(
                downloaded,
                cancelled = cancel.is_set(),
                "download incomplete; partial data kept for resume"
            );
            return Ok(DownloadReport {
                path,
                outcome: Outcome::Aborted,
                bytes: downloaded,
                segmented,
                elapsed: started.elapsed(),
            });
        }

        let bytes = if segmented {
            enter(Phase::Combining, &path);
            storage::combine(&path, segment_count)?
        } else {
            downloaded
        };
        enter(Phase::Done, &path);
        tracing::info!(bytes, "download complete: {}", path.display());
        Ok(DownloadReport {
            path,
            outcome: Outcome::Completed,
            bytes,
            segmented,
            elapsed: started.elapsed(),
        })
    }

    /// One thread per worker. If a spawn fails the already running workers are
    /// cancelled and joined before the error is returned.
    fn spawn(
        &self,
        workers: Vec<Box<dyn Worker>>,
        cancel: &CancellationSignal,
    ) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(workers.len());
        for worker in workers {
            let transport = Arc::clone(&self.transport);
            let worker_cancel = cancel.clone();
            let abort_grace = self.options.abort_grace;
            let spawned = thread::Builder::new()
                .name(format!("pdl-worker-{}", worker.state().id()))
                .spawn(move || {
                    worker.run(&TransferContext {
                        transport: transport.as_ref(),
                        cancel: &worker_cancel,
                        abort_grace,
                    })
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    cancel.set();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e).context("spawn download worker");
                }
            }
        }
        Ok(handles)
    }
}
