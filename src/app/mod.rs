#[cfg(unix)]
mod mpv;
mod nav;
mod player;
mod screen;
mod tui;


use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::{Config, SourceKind, SourceList, read_source_list};
use crate::feed::{Catalog, load_catalog};
use crate::git::GitRemote;
use crate::http::{HttpTransport, RetryPolicy, sleep_blocking};
use crate::paths::config_file_path;
use crate::store::{GitBackend, ListenBackend, ListenRecord, ListenStore, LocalFileBackend};

use self::nav::Navigator;
use self::player::MediaOpener;
use self::screen::{format_clock, status_error, status_info, truncate};
use self::tui::TuiInteraction;

pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };

    if let Some(Command::Init) = cli.command {
        return run_init(&config_path);
    }

    let config = Config::load(&config_path)?;
    info!(
        config = %config_path.display(),
        sources = %config.sources.path.display(),
        kind = ?config.sources.kind,
        "configuration loaded"
    );

    match cli.command {
        Some(Command::Shows) => run_shows(&config)?,
        Some(Command::History) => run_history(&config)?,
        Some(Command::Tui) | Some(Command::Init) | None => run_tui(&config)?,
    }

    Ok(())
}

fn run_tui(config: &Config) -> Result<()> {
    prepare_sources(config);
    let transport = HttpTransport::default();
    let catalog = load_feeds(config, &transport)?;
    let mut store = open_store(config)?;
    let mut media = media_opener(config);

    let status = if catalog.is_empty() {
        status_error("No shows could be loaded. Check sources.json and the log file.")
    } else {
        status_info(&format!("Loaded {} shows.", catalog.feeds().len()))
    };

    let mut ui = TuiInteraction::start(status)?;
    let result = Navigator::new(
        &catalog,
        &mut store,
        &mut ui,
        media.as_mut(),
        &transport,
        config.player.skip_secs,
    )
    .run();
    let finished = ui.finish();
    result?;
    finished
}

fn run_shows(config: &Config) -> Result<()> {
    prepare_sources(config);
    let catalog = load_feeds(config, &HttpTransport::default())?;
    if catalog.is_empty() {
        println!("No shows could be loaded. Check sources.json and the log file.");
        return Ok(());
    }

    println!("{:<64} {:>8}", "SHOW", "EPISODES");
    for (feed, label) in catalog.feeds().iter().zip(catalog.labels()) {
        println!("{:<64} {:>8}", truncate(&label, 64), feed.episodes.len());
    }
    Ok(())
}

fn run_history(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let record = store.record();
    if record.is_empty() {
        println!("No listen positions stored yet.");
        return Ok(());
    }

    println!("{:<64} {:>10}", "EPISODE", "POSITION");
    for (title, elapsed) in record.entries() {
        let position = if elapsed == 0 {
            "start".to_string()
        } else {
            format_clock(elapsed)
        };
        println!("{:<64} {:>10}", truncate(title, 64), position);
    }
    Ok(())
}

fn run_init(config_path: &Path) -> Result<()> {
    let config = if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        Config::load(config_path)?
    } else {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).context("failed to serialize default config")?;
        write_new_file(config_path, raw.as_bytes())?;
        println!("Wrote config: {}", config_path.display());
        config
    };

    let sources_file = config.sources_file();
    if sources_file.exists() {
        println!("Source list already exists: {}", sources_file.display());
    } else {
        let raw = serde_json::to_vec_pretty(&SourceList::default())
            .context("failed to serialize source list")?;
        write_new_file(&sources_file, &raw)?;
        println!("Wrote source list: {}", sources_file.display());
    }

    let listen_file = config.listen_file();
    if !listen_file.exists() {
        LocalFileBackend::new(&listen_file).save(&ListenRecord::default())?;
        println!("Wrote listen times: {}", listen_file.display());
    }
    Ok(())
}

fn write_new_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// A failed pull leaves the local checkout as it is; the app keeps going.
fn prepare_sources(config: &Config) {
    if config.sources.kind != SourceKind::Git {
        return;
    }
    if let Err(err) = GitRemote::new(&config.sources.path).pull() {
        warn!("continuing with local sources: {err}");
        eprintln!("warning: {err}");
    }
}

fn load_feeds(config: &Config, transport: &HttpTransport) -> Result<Catalog> {
    let sources = read_source_list(&config.sources_file())?;
    print!("Downloading feeds... ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut sleep = sleep_blocking;
    let catalog = load_catalog(
        &sources,
        &config.sources.path,
        transport,
        RetryPolicy::default(),
        &mut sleep,
    );
    println!("Done");
    Ok(catalog)
}

fn open_store(config: &Config) -> Result<ListenStore> {
    let local = LocalFileBackend::new(config.listen_file());
    let backend: Box<dyn ListenBackend> = match config.sources.kind {
        SourceKind::Local => Box::new(local),
        SourceKind::Git => Box::new(GitBackend::new(
            local,
            GitRemote::new(&config.sources.path),
        )),
    };
    ListenStore::open(backend).context("failed to load listen times")
}

fn media_opener(config: &Config) -> Box<dyn MediaOpener> {
    #[cfg(unix)]
    {
        Box::new(mpv::MpvOpener::new(config.player.mpv_binary.clone()))
    }
    #[cfg(not(unix))]
    {
        let _ = &config.player.mpv_binary;
        Box::new(player::UnsupportedOpener)
    }
}
