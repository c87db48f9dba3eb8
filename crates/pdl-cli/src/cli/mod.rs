//! CLI for the PDL segmented downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pdl_core::config;
use std::path::PathBuf;

use commands::{run_get, run_status, GetSettings};

/// Top-level CLI for the PDL downloader.
#[derive(Debug, Parser)]
#[command(name = "pdl")]
#[command(about = "PDL: resumable segmented HTTP downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, resuming a previous incomplete attempt when possible.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Destination file or directory (default: current directory).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Number of segments (default from config).
        #[arg(short, long, value_name = "N")]
        segments: Option<usize>,

        /// Download as one stream even if the server supports ranges.
        #[arg(long)]
        single: bool,

        /// Resume a previous plan without comparing ETags.
        #[arg(long)]
        no_etag: bool,

        /// Re-run an incomplete download up to N more times (default from config).
        #[arg(long, value_name = "N")]
        retries: Option<u32>,

        /// Alternative URL for the same file, used in turn by retries. Repeatable.
        #[arg(long = "mirror", value_name = "URL")]
        mirrors: Vec<String>,

        /// Extra request header, e.g. -H 'Authorization: Bearer x'. Repeatable.
        #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Show the resume state of a destination file.
    Status {
        /// Destination file of a previous `pdl get`.
        path: PathBuf,
    },
}

/// `Name: value` → (name, value).
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                segments,
                single,
                no_etag,
                retries,
                mirrors,
                headers,
            } => {
                let mut options = cfg.download_options();
                if let Some(n) = segments {
                    options.segments = n;
                }
                options.multi_segment &= !single;
                options.check_etag &= !no_etag;
                options.headers.extend(headers);
                let settings = GetSettings {
                    options,
                    curl: cfg.curl_options(),
                    retries: retries.unwrap_or(cfg.retries),
                    retry_delay: std::time::Duration::from_secs(cfg.retry_delay_secs),
                    mirrors,
                };
                run_get(&url, output, settings).await?;
            }
            CliCommand::Status { path } => run_status(&path)?,
        }

        Ok(())
    }
}
