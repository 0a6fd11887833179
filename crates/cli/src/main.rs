//! SmartFind CLI
//!
//! Main entry point for the smartfind command-line tool.
//! Classifies, indexes and searches local documents with on-device embeddings.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    ClassifyCommand, DuplicatesCommand, IndexCommand, InitCommand, RemoveCommand, SearchCommand,
    SimilarCommand, StatsCommand, SummarizeCommand,
};
use smartfind_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// SmartFind - on-device document classification and semantic search
#[derive(Parser, Debug)]
#[command(name = "smartfind")]
#[command(about = "On-device document classification and semantic search", long_about = None)]
#[command(version)]
struct Cli {
    /// Storage root for the index (default: current directory)
    #[arg(short, long, global = true, env = "SMARTFIND_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory holding the embedding assets
    #[arg(short, long, global = true, env = "SMARTFIND_ASSETS")]
    assets: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SMARTFIND_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write default engine settings under the data directory
    Init(InitCommand),

    /// Assign a topic to a text or file
    Classify(ClassifyCommand),

    /// Index files and directories
    Index(IndexCommand),

    /// Search indexed documents
    Search(SearchCommand),

    /// Find documents similar to an indexed file
    Similar(SimilarCommand),

    /// List groups of near-identical documents
    Duplicates(DuplicatesCommand),

    /// Remove files from the index
    Remove(RemoveCommand),

    /// Print an extractive summary of a file
    Summarize(SummarizeCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // The data dir and config file decide which YAML is read, so they go in first
    let config = AppConfig::load_from(cli.data_dir.clone(), cli.config.clone())?.with_overrides(
        cli.data_dir,
        cli.assets,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("SmartFind CLI starting");
    tracing::debug!("Data dir: {:?}", config.data_dir);
    tracing::debug!("Asset dir: {:?}", config.asset_dir);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Init(_) => "init",
        Commands::Classify(_) => "classify",
        Commands::Index(_) => "index",
        Commands::Search(_) => "search",
        Commands::Similar(_) => "similar",
        Commands::Duplicates(_) => "duplicates",
        Commands::Remove(_) => "remove",
        Commands::Summarize(_) => "summarize",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Init(cmd) => cmd.execute(&config).await,
        Commands::Classify(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Similar(cmd) => cmd.execute(&config).await,
        Commands::Duplicates(cmd) => cmd.execute(&config).await,
        Commands::Remove(cmd) => cmd.execute(&config).await,
        Commands::Summarize(cmd) => cmd.execute().await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
