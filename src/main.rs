mod cli;
mod commands;
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use segfetch::Config;

use crate::cli::LogLevel;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL to download
    #[arg(index = 1)]
    url: Option<String>,

    /// Number of parts fetched concurrently (defaults to number of logical CPUs)
    #[arg(short = 'c', long)]
    connections: Option<usize>,

    /// Directory to save the downloaded file
    #[arg(short = 'd', long = "download-dir", default_value = ".")]
    download_dir: PathBuf,

    /// Directory for per-part staging files
    #[arg(long = "staging-dir", default_value = ".segfetch")]
    staging_dir: PathBuf,

    /// Rate limit in bytes per second, applied to each part
    #[arg(short = 'r', long)]
    rate_limit: Option<u64>,

    /// Bytes copied per round when no rate limit is set
    #[arg(short = 'b', long, default_value_t = 64 * 1024)]
    buffer_size: u64,

    /// Whole-request timeout in seconds (none by default)
    #[arg(long)]
    timeout: Option<u64>,

    /// Where to save the session when the download stops early
    #[arg(short = 's', long = "state-file")]
    state_file: Option<PathBuf>,

    /// Resume the session saved in this file
    #[arg(long, conflicts_with = "url")]
    resume: Option<PathBuf>,

    /// Show the parts of the session saved in this file
    #[arg(short = 'l', long, conflicts_with_all = ["url", "resume"])]
    inspect: Option<PathBuf>,

    /// Log verbosity
    #[arg(long = "log-level", value_enum, default_value = "warn")]
    log_level: LogLevel,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level.into())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Some(state_file) = args.inspect {
            return crate::commands::inspect_state(state_file).await;
        }
        if let Some(state_file) = args.resume {
            return crate::commands::resume_download(state_file).await;
        }
        let Some(url) = args.url else {
            bail!("Nothing to do: pass a URL, --resume or --inspect");
        };

        let defaults = Config::default();
        let config = Config {
            connections: args.connections.unwrap_or(defaults.connections),
            staging_dir: args.staging_dir,
            output_dir: args.download_dir,
            rate_limit: args.rate_limit,
            buffer_size: args.buffer_size,
            timeout: args.timeout.map(Duration::from_secs),
        };
        crate::commands::run_single_download(url, config, args.state_file).await
    })
}
