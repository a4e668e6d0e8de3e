use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "termcast",
    version,
    about = "Browse podcast feeds, stream episodes and resume where you stopped"
)]
pub struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive player (default).
    Tui,
    /// Print the loaded shows and exit.
    Shows,
    /// Print stored listen positions and exit.
    History,
    /// Write a default config and an empty sources directory.
    Init,
}
