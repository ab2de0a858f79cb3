use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use minimux::logging::{FileSink, LogLevel, Logger};
use minimux::runtime::RuntimeConfig;
use minimux::runtime::driver::cli::CliDriver;

const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(name = "minimux")]
#[command(about = "Run several commands side by side in one terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Dashboard description (TOML)
    config: PathBuf,
    /// Write JSON-lines diagnostics to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Truncate the log file once it grows past this many bytes (0 = never)
    #[arg(long, default_value_t = DEFAULT_LOG_MAX_BYTES)]
    log_max_bytes: u64,
    /// Also log debug events
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let layout = minimux::config::load_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut config = RuntimeConfig::default();
    if let Some(path) = cli.log_file.as_ref() {
        let sink = FileSink::new(path, cli.log_max_bytes)
            .with_context(|| format!("opening log file {}", path.display()))?;
        let level = if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        config = config.with_logger(Logger::new(sink).with_min_level(level));
        config.enable_metrics();
    }

    CliDriver::new(layout, config)
        .run()
        .context("dashboard terminated abnormally")?;
    Ok(())
}
