mod app;
mod cli;
mod config;
mod error;
mod feed;
mod git;
mod http;
mod paths;
mod store;

use std::fs::{self, OpenOptions};

use anyhow::{Context, Result};
use clap::Parser;

use crate::paths::log_file_path;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging()?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "termcast starting");
    app::run(cli)
}

/// Logs go to a file; the terminal belongs to the TUI.
fn init_logging() -> Result<()> {
    let log_path = log_file_path()?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ureq=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();
    Ok(())
}
