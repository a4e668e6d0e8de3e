use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::error::ConfigError;

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
    Ok(base.join("termcast").join("config.toml"))
}

pub fn default_sources_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("termcast")
        .join("sources")
}

pub fn log_file_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("termcast").join("termcast.log"))
}
