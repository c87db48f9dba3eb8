use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::DownloadOptions;
use crate::transport::CurlOptions;

/// Global configuration loaded from `~/.config/pdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdlConfig {
    /// Segments requested per download (files under 50 MiB use at most 5).
    pub segments: usize,
    /// Use ranged segments when the server supports them.
    pub multi_segment: bool,
    /// Only resume a previous plan when the server's ETag is unchanged.
    pub check_etag: bool,
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than `low_speed_limit` bytes/sec for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Optional curl receive buffer size in bytes (None = libcurl default).
    pub buffer_size: Option<usize>,
    /// Progress aggregation interval.
    pub poll_interval_ms: u64,
    /// Pause of a failing worker after signalling its siblings to stop.
    pub abort_grace_ms: u64,
    /// Extra attempts after an incomplete download (each resumes the last).
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for PdlConfig {
    fn default() -> Self {
        Self {
            segments: 10,
            multi_segment: true,
            check_etag: true,
            connect_timeout_secs: 5,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            buffer_size: None,
            poll_interval_ms: 150,
            abort_grace_ms: 1000,
            retries: 0,
            retry_delay_secs: 3,
        }
    }
}

impl PdlConfig {
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            segments: self.segments,
            multi_segment: self.multi_segment,
            check_etag: self.check_etag,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            abort_grace: Duration::from_millis(self.abort_grace_ms),
            ..DownloadOptions::default()
        }
    }

    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            buffer_size: self.buffer_size,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
