//! On-disk layout of a download and the final combine step.
//!
//! While running, a download to `file` owns `file.0 .. file.N-1` (one per
//! segment) and the sidecar `file.json`. Combining merges the segment files
//! in index order into `file` and removes the transient ones.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Block size used when copying segment files into the destination.
pub const COMBINE_BLOCK_SIZE: usize = 4096 * 1024;

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

/// `file.<index>`
pub fn segment_path(file_path: &Path, index: usize) -> PathBuf {
    with_suffix(file_path, &format!(".{}", index))
}

/// `file.json`
pub fn sidecar_path(file_path: &Path) -> PathBuf {
    with_suffix(file_path, ".json")
}

/// Concatenates `file.0 .. file.<segment_count-1>` into `file_path`, deleting
/// each segment file once copied, then deletes the sidecar. Returns bytes written.
///
/// Callers must only combine after every segment completed; nothing here
/// checks sizes.
pub fn combine(file_path: &Path, segment_count: usize) -> Result<u64> {
    let mut dest = File::create(file_path)
        .with_context(|| format!("create destination: {}", file_path.display()))?;
    let mut block = vec![0u8; COMBINE_BLOCK_SIZE];
    let mut written = 0u64;

    for index in 0..segment_count {
        let part = segment_path(file_path, index);
        let mut src =
            File::open(&part).with_context(|| format!("open segment: {}", part.display()))?;
        loop {
            let n = src
                .read(&mut block)
                .with_context(|| format!("read segment: {}", part.display()))?;
            if n == 0 {
                break;
            }
            dest.write_all(&block[..n])
                .with_context(|| format!("write destination: {}", file_path.display()))?;
            written += n as u64;
        }
        drop(src);
        std::fs::remove_file(&part)
            .with_context(|| format!("remove segment: {}", part.display()))?;
    }
    dest.flush()?;

    let sidecar = sidecar_path(file_path);
    std::fs::remove_file(&sidecar)
        .with_context(|| format!("remove sidecar: {}", sidecar.display()))?;
    tracing::debug!(path = %file_path.display(), bytes = written, "segments combined");
    Ok(written)
}
