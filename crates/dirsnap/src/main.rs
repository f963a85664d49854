//! dirsnap - directory snapshots and change detection.
//!
//! This is the main entry point for the dirsnap CLI.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dirsnap_storage::JsonStorage;
use dirsnap_util::log::{LogConfig, LogLevel};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dirsnap")]
#[command(
    author,
    version,
    about = "Snapshot directories and report new or changed files",
    long_about = None
)]
struct Cli {
    /// Directory where snapshots are stored
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one snapshot and print it as JSON
    Snapshot {
        /// Channel configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Directory to snapshot
        #[arg(short, long)]
        path: String,

        /// Reuse the stored snapshot if there is one
        #[arg(long)]
        initial: bool,

        /// Write the snapshot to the store
        #[arg(long)]
        store: bool,
    },
    /// Compare two snapshot files
    Diff {
        /// Earlier snapshot
        previous: PathBuf,

        /// Later snapshot
        current: PathBuf,
    },
    /// Poll a directory and print files as they appear or change
    Watch {
        /// Channel configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Directory to watch, defaults to the channel's paths
        #[arg(short, long)]
        path: Option<String>,

        /// Seconds between polls, overriding the channel setting
        #[arg(short, long)]
        interval: Option<f64>,

        /// Write each snapshot to the store
        #[arg(long)]
        store: bool,
    },
}

fn open_storage(data_dir: Option<PathBuf>) -> anyhow::Result<Arc<JsonStorage>> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => dirsnap_util::path::snapshots_dir()
            .context("cannot determine a data directory, pass --data-dir")?,
    };
    Ok(Arc::new(JsonStorage::new(dir)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    log_config.json = cli.log_json;
    dirsnap_util::log::init(log_config);

    match cli.command {
        Commands::Snapshot {
            config,
            path,
            initial,
            store,
        } => {
            let storage = open_storage(cli.data_dir)?;
            commands::snapshot(&config, &path, initial, store, storage).await
        }
        Commands::Diff { previous, current } => commands::diff(&previous, &current).await,
        Commands::Watch {
            config,
            path,
            interval,
            store,
        } => {
            let storage = open_storage(cli.data_dir)?;
            commands::watch(&config, path, interval, store, storage).await
        }
    }
}
