//! Download workers.
//!
//! Both worker kinds share one chunk loop ([`chunked_transfer`]): stream a GET
//! into a file, count bytes, update the instantaneous speed and check the
//! cancellation signal after every chunk. [`SegmentWorker`] wraps it with
//! resume detection and a ranged request; [`WholeFileWorker`] streams the whole
//! body with no resume.

mod segment;
mod single;

pub use segment::SegmentWorker;
pub use single::WholeFileWorker;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::control::CancellationSignal;
use crate::transport::{ChunkControl, Request, Transport, TransportError};

/// Why a worker gave up.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("disk: {0}")]
    Io(#[from] std::io::Error),
}

/// Live state of one worker. Written only by the owning worker, read by the
/// coordinator while the download runs.
#[derive(Debug, Default)]
pub struct WorkerState {
    id: usize,
    bytes_downloaded: AtomicU64,
    completed: AtomicBool,
    /// f64 bits of bytes/sec measured on the last chunk.
    speed: AtomicU64,
}

impl WorkerState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Relaxed)
    }

    /// Bytes per second over the most recent chunk.
    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed.load(Ordering::Relaxed))
    }

    fn set_bytes(&self, n: u64) {
        self.bytes_downloaded.store(n, Ordering::Relaxed);
    }

    fn add_bytes(&self, n: u64) {
        self.bytes_downloaded.fetch_add(n, Ordering::Relaxed);
    }

    fn set_speed(&self, bytes_per_sec: f64) {
        self.speed.store(bytes_per_sec.to_bits(), Ordering::Relaxed);
    }

    fn mark_completed(&self) {
        self.set_speed(0.0);
        self.completed.store(true, Ordering::Relaxed);
    }
}

/// A unit of work the coordinator runs on its own thread.
pub trait Worker: Send {
    fn state(&self) -> Arc<WorkerState>;
    fn run(&self, ctx: &TransferContext<'_>);
}

/// What every worker of one attempt shares.
pub struct TransferContext<'a> {
    pub transport: &'a dyn Transport,
    pub cancel: &'a CancellationSignal,
    /// Pause after setting the signal on failure so siblings observe it.
    pub abort_grace: Duration,
}

impl TransferContext<'_> {
    /// Failure path of a worker: stop the whole attempt, give siblings time to
    /// notice, and report.
    fn abort(&self, worker: usize, err: &WorkerError) {
        self.cancel.set();
        std::thread::sleep(self.abort_grace);
        tracing::error!(worker, "worker aborted: {}", err);
    }
}

/// How the destination file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Continue a partial file.
    Append,
    /// Start from an empty file.
    Truncate,
}

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferEnd {
    /// The response body was read to the end.
    Exhausted,
    /// The cancellation signal was observed after a chunk.
    Cancelled,
    /// Transport or disk error; the signal has been set.
    Failed,
}

fn open(dest: &Path, mode: WriteMode) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        WriteMode::Append => options.append(true),
        WriteMode::Truncate => options.write(true).truncate(true),
    };
    options.open(dest)
}

/// The shared chunk loop. Bytes are appended to `dest` and counted on `state`.
pub(crate) fn chunked_transfer(
    ctx: &TransferContext<'_>,
    request: &Request,
    dest: &Path,
    mode: WriteMode,
    state: &WorkerState,
) -> TransferEnd {
    match stream_into(ctx, request, dest, mode, state) {
        Ok(true) => {
            tracing::debug!(worker = state.id(), "stopping on cancellation");
            TransferEnd::Cancelled
        }
        Ok(false) => TransferEnd::Exhausted,
        Err(e) => {
            ctx.abort(state.id(), &e);
            TransferEnd::Failed
        }
    }
}

/// Returns `Ok(true)` when the loop stopped because of the cancellation signal.
fn stream_into(
    ctx: &TransferContext<'_>,
    request: &Request,
    dest: &Path,
    mode: WriteMode,
    state: &WorkerState,
) -> Result<bool, WorkerError> {
    let mut file = open(dest, mode)?;
    let mut write_error: Option<std::io::Error> = None;
    let mut cancelled = false;
    let mut last = Instant::now();

    ctx.transport.stream_get(request, &mut |chunk: &[u8]| {
        if let Err(e) = file.write_all(chunk) {
            write_error = Some(e);
            return ChunkControl::Stop;
        }
        state.add_bytes(chunk.len() as u64);
        let elapsed = last.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            state.set_speed(chunk.len() as f64 / elapsed);
        }

        if ctx.cancel.is_set() {
            cancelled = true;
            return ChunkControl::Stop;
        }
        last = Instant::now();
        ChunkControl::Continue
    })?;

    if let Some(e) = write_error {
        return Err(e.into());
    }
    file.flush()?;
    Ok(cancelled)
}
