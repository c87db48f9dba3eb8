//! `pdl status` – show the resume state of a destination file.

use anyhow::Result;
use pdl_core::segmenter::ProgressRecord;
use pdl_core::storage::sidecar_path;
use std::path::Path;

pub fn run_status(path: &Path) -> Result<()> {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        if path.exists() {
            println!("{}: complete ({} bytes)", path.display(), std::fs::metadata(path)?.len());
        } else {
            println!("{}: no download in progress", path.display());
        }
        return Ok(());
    }

    let record = ProgressRecord::load(&sidecar)?;
    println!("URL:      {}", record.url);
    println!("ETag:     {}", record.etag.as_deref().unwrap_or("-"));
    println!("Segments: {}", record.segments);
    println!("{:<4} {:>12} {:>12} {:>12} {:>7}", "SEG", "START", "END", "ON DISK", "DONE");

    let mut have_total = 0u64;
    let mut size_total = 0u64;
    for (index, entry) in record.entries() {
        let have = std::fs::metadata(&entry.segment_path)
            .map(|m| m.len())
            .unwrap_or(0);
        have_total += have.min(entry.segment_size);
        size_total += entry.segment_size;
        println!(
            "{:<4} {:>12} {:>12} {:>12} {:>6.1}%",
            index,
            entry.start,
            entry.end,
            have,
            percent(have, entry.segment_size)
        );
    }
    println!(
        "Total:    {} / {} bytes ({:.1}%)",
        have_total,
        size_total,
        percent(have_total, size_total)
    );
    Ok(())
}

fn percent(have: u64, size: u64) -> f64 {
    if size == 0 {
        100.0
    } else {
        (have.min(size) as f64 / size as f64) * 100.0
    }
}
