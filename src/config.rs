use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::default_sources_dir;

pub const SOURCES_FILE: &str = "sources.json";
pub const LISTEN_FILE: &str = "listen_time.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

/// How the sources directory (feed list + listen times) is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Local,
    /// The directory is a git checkout: pulled at startup, committed and
    /// pushed after every listen-time save.
    Git,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_sources_dir")]
    pub path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            path: default_sources_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_mpv_binary")]
    pub mpv_binary: PathBuf,
    #[serde(default = "default_skip_secs")]
    pub skip_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mpv_binary: default_mpv_binary(),
            skip_secs: default_skip_secs(),
        }
    }
}

fn default_mpv_binary() -> PathBuf {
    PathBuf::from("mpv")
}

fn default_skip_secs() -> u64 {
    10
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.sources.path = expand_home(&config.sources.path);
        Ok(config)
    }

    pub fn sources_file(&self) -> PathBuf {
        self.sources.path.join(SOURCES_FILE)
    }

    pub fn listen_file(&self) -> PathBuf {
        self.sources.path.join(LISTEN_FILE)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SourceList {
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Reads `sources.json`, trimming entries and skipping blank lines.
pub fn read_source_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let list: SourceList = serde_json::from_str(&raw).map_err(|source| ConfigError::Sources {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(list
        .sources
        .into_iter()
        .map(|source| source.trim().to_string())
        .filter(|source| !source.is_empty())
        .collect())
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
