//! `pdl get` – download one URL with a progress line, Ctrl-C and attempt retries.

use anyhow::Result;
use pdl_core::control::{CancellationSignal, DownloadAborted};
use pdl_core::scheduler::{
    format_hms, DownloadOptions, DownloadReport, Downloader, Outcome, ProgressStats,
};
use pdl_core::transport::{CurlOptions, CurlTransport};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const PROGRESS_INTERVAL_MS: u64 = 500;
const MIB: f64 = 1_048_576.0;
const BAR_WIDTH: usize = 20;

/// Resolved settings for one `pdl get` (config file plus flags).
#[derive(Debug, Clone)]
pub struct GetSettings {
    pub options: DownloadOptions,
    pub curl: CurlOptions,
    /// Extra attempts after an incomplete one.
    pub retries: u32,
    pub retry_delay: Duration,
    /// URLs tried in turn by attempts after the first.
    pub mirrors: Vec<String>,
}

/// URL for attempt `attempt` (1-based): the primary first, then the mirrors
/// round-robin. Without mirrors every attempt uses the primary.
fn attempt_url<'a>(url: &'a str, mirrors: &'a [String], attempt: u32) -> &'a str {
    if attempt <= 1 || mirrors.is_empty() {
        return url;
    }
    let slot = (attempt as usize - 2) % mirrors.len();
    &mirrors[slot]
}

pub async fn run_get(url: &str, output: Option<PathBuf>, settings: GetSettings) -> Result<()> {
    let interrupted = CancellationSignal::new();
    let on_ctrl_c = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.set();
        }
    });

    let transport = Arc::new(CurlTransport::new(settings.curl));
    let downloader = Arc::new(Downloader::new(transport, settings.options));
    let attempts = settings.retries.saturating_add(1);
    // Once an attempt has resolved the destination, later attempts (possibly
    // on a mirror with another filename) resume into the same path.
    let mut target = output;

    for attempt in 1..=attempts {
        if attempt > 1 {
            println!(
                "Retrying in {}s (attempt {}/{})",
                settings.retry_delay.as_secs(),
                attempt,
                attempts
            );
            tokio::time::sleep(settings.retry_delay).await;
            if interrupted.is_set() {
                break;
            }
        }

        let source = attempt_url(url, &settings.mirrors, attempt);
        if source != url {
            tracing::info!(attempt, "trying mirror {}", source);
        }
        match run_attempt(&downloader, source, target.clone(), &interrupted).await {
            Ok(report) if report.outcome == Outcome::Completed => {
                println!(
                    "Saved {} ({:.1} MiB in {})",
                    report.path.display(),
                    report.bytes as f64 / MIB,
                    format_hms(report.elapsed.as_secs_f64())
                );
                return Ok(());
            }
            Ok(report) => {
                tracing::warn!(attempt, bytes = report.bytes, "attempt incomplete: {}", report.path.display());
                eprintln!(
                    "Incomplete: {} bytes on disk for {}; run again to resume.",
                    report.bytes,
                    report.path.display()
                );
                target = Some(report.path);
            }
            Err(e) if attempt < attempts && !interrupted.is_set() => {
                tracing::warn!(attempt, "attempt failed: {:#}", e);
                eprintln!("Attempt {} failed: {:#}", attempt, e);
            }
            Err(e) => return Err(e),
        }

        if interrupted.is_set() {
            break;
        }
    }
    Err(DownloadAborted.into())
}

/// One blocking download on the runtime's blocking pool. Its cancellation
/// signal is fresh (a failed attempt leaves its own set) and follows Ctrl-C.
async fn run_attempt(
    downloader: &Arc<Downloader>,
    url: &str,
    output: Option<PathBuf>,
    interrupted: &CancellationSignal,
) -> Result<DownloadReport> {
    let cancel = CancellationSignal::new();
    let forward = tokio::spawn(forward_interrupt(interrupted.clone(), cancel.clone()));
    let (progress_tx, progress_rx) = mpsc::channel::<ProgressStats>(16);
    let printer = tokio::spawn(print_progress(progress_rx));

    let dl = Arc::clone(downloader);
    let url = url.to_string();
    let result = tokio::task::spawn_blocking(move || {
        dl.download(&url, output.as_deref(), &cancel, Some(&progress_tx))
    })
    .await;

    forward.abort();
    let _ = printer.await;
    let report = result??;
    Ok(report)
}

async fn forward_interrupt(from: CancellationSignal, to: CancellationSignal) {
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    loop {
        tick.tick().await;
        if from.is_set() {
            to.set();
            return;
        }
    }
}

async fn print_progress(mut rx: mpsc::Receiver<ProgressStats>) {
    let mut last_print: Option<Instant> = None;
    while let Some(stats) = rx.recv().await {
        let due = last_print
            .map_or(true, |t| t.elapsed() >= Duration::from_millis(PROGRESS_INTERVAL_MS));
        let finished = stats.worker_count > 0 && stats.workers_done == stats.worker_count;
        if due || finished {
            print!("\r{}", progress_line(&stats));
            let _ = std::io::stdout().flush();
            last_print = Some(Instant::now());
        }
    }
    if last_print.is_some() {
        println!();
    }
}

fn progress_line(stats: &ProgressStats) -> String {
    let done_mib = stats.downloaded as f64 / MIB;
    let rate_mib = stats.speed / MIB;
    let elapsed = format_hms(stats.elapsed_secs);
    match (stats.fraction(), stats.total) {
        (Some(fraction), Some(total)) => {
            let filled = ((fraction * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
            let eta = stats
                .eta_secs()
                .map(format_hms)
                .unwrap_or_else(|| "--:--:--".to_string());
            format!(
                "[{}{}] {:.1}/{:.1} MiB ({:.1}%)  {:.2} MiB/s  {}  ETA {}  ",
                "#".repeat(filled),
                " ".repeat(BAR_WIDTH - filled),
                done_mib,
                total as f64 / MIB,
                fraction * 100.0,
                rate_mib,
                elapsed,
                eta
            )
        }
        _ => format!("{:.1} MiB  {:.2} MiB/s  {}  ", done_mib, rate_mib, elapsed),
    }
}
