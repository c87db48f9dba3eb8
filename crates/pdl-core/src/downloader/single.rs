//! Single-stream download of the whole body (no Range, no resume).

use std::path::PathBuf;
use std::sync::Arc;

use super::{chunked_transfer, TransferContext, TransferEnd, Worker, WorkerState, WriteMode};
use crate::transport::Request;

pub struct WholeFileWorker {
    request: Request,
    dest: PathBuf,
    state: Arc<WorkerState>,
}

impl WholeFileWorker {
    pub fn new(request: Request, dest: PathBuf) -> Self {
        Self {
            request,
            dest,
            state: Arc::new(WorkerState::new(0)),
        }
    }
}

impl Worker for WholeFileWorker {
    fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.state)
    }

    /// Streams the body into `dest`, replacing any previous content.
    fn run(&self, ctx: &TransferContext<'_>) {
        if ctx.cancel.is_set() {
            return;
        }
        let end = chunked_transfer(ctx, &self.request, &self.dest, WriteMode::Truncate, &self.state);
        if end == TransferEnd::Exhausted {
            self.state.mark_completed();
        }
    }
}
