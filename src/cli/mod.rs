//! Command-line interface.
//!
//! Parses arguments, loads settings, and dispatches to the command modules.

mod commands;
mod helpers;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::models::Provider;

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(about = "News video discovery and media acquisition")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the database and downloads (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and database
    Init,

    /// Search news sites for videos matching a term
    Search {
        /// Search term
        #[arg(short, long)]
        query: String,
        /// Providers to search (default: all)
        #[arg(short, long, value_delimiter = ',')]
        providers: Vec<Provider>,
        /// Only scrape the first page of results
        #[arg(long)]
        no_pagination: bool,
        /// Replace the provider's search URL prefix (the encoded term is appended)
        #[arg(long)]
        search_url: Option<String>,
    },

    /// Ask the language model which discovered videos are worth downloading
    Aicheck {
        /// Maximum records to classify (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Resolve and download approved videos
    DownloadVideos {
        /// Maximum concurrent acquisitions (default from config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Give up on unfinished work after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.data,
    };
    let (settings, _config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => commands::init::cmd_init(&settings).await,
        Commands::Search {
            query,
            providers,
            no_pagination,
            search_url,
        } => {
            commands::search::cmd_search(
                &settings,
                &query,
                &providers,
                !no_pagination,
                search_url,
            )
            .await
        }
        Commands::Aicheck { limit } => commands::aicheck::cmd_aicheck(&settings, limit).await,
        Commands::DownloadVideos { workers, timeout } => {
            commands::download::cmd_download_videos(&settings, workers, timeout).await
        }
    }
}
