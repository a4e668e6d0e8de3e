use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching or parsing a single feed source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to read feed file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse feed from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: rss::Error,
    },
}

/// Errors raised while resolving or driving an episode stream.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("episode '{title}' has no playable link")]
    NoAudioLink { title: String },

    #[error("stream {url} is unreachable: {message}")]
    Unreachable { url: String, message: String },

    #[error("failed to launch {binary}: {source}")]
    Launch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("media player IPC failed: {0}")]
    Ipc(#[from] std::io::Error),

    #[error("media player rejected '{command}': {reason}")]
    Rejected { command: String, reason: String },

    #[error("media player is not supported on this platform")]
    Unsupported,
}

/// Errors raised while loading or saving listen positions.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to read listen times from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write listen times to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse listen times in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed listen times in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("git {command} failed: {detail}")]
    Git { command: String, detail: String },
}

/// Errors raised while loading configuration. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {path} not found (run `termcast init` to create one)")]
    Missing { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse source list {path}: {source}")]
    Sources {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to resolve {0} directory")]
    NoDirectory(&'static str),
}
