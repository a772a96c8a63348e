//! MegaCustom CLI - Command-line interface for the MegaCustom core
//!
//! Provides commands for:
//! - Account login, session restore, and switching
//! - Transfer queue inspection and control
//! - Rule-based multi-destination uploads
//! - Folder mappings and smart sync profiles
//! - Cloud search
//! - Bulk renaming with undo
//! - Scheduled background tasks

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;

use app::App;
use commands::auth::AuthCommand;
use commands::map::MapCommand;
use commands::rename::RenameCommand;
use commands::schedule::ScheduleCommand;
use commands::search::SearchCommand;
use commands::sync::SyncCommand;
use commands::transfers::TransfersCommand;
use commands::upload::UploadCommand;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "megacustom", version, about = "Cloud storage power tools")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Account and session management
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Inspect and control the transfer queue
    #[command(subcommand)]
    Transfers(TransfersCommand),
    /// Rule-based multi-destination upload
    #[command(subcommand)]
    Upload(UploadCommand),
    /// Named folder mappings with incremental upload
    #[command(subcommand)]
    Map(MapCommand),
    /// Sync profiles and execution
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Search the remote namespace
    Search(SearchCommand),
    /// Bulk rename with preview and undo
    #[command(subcommand)]
    Rename(RenameCommand),
    /// Scheduled background tasks
    #[command(subcommand)]
    Schedule(ScheduleCommand),
}

/// Route a parsed command to its handler
pub async fn dispatch(command: Commands, app: &App, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Auth(cmd) => cmd.execute(app, format).await,
        Commands::Transfers(cmd) => cmd.execute(app, format).await,
        Commands::Upload(cmd) => cmd.execute(app, format).await,
        Commands::Map(cmd) => cmd.execute(app, format).await,
        Commands::Sync(cmd) => cmd.execute(app, format).await,
        Commands::Search(cmd) => cmd.execute(app, format).await,
        Commands::Rename(cmd) => cmd.execute(app, format).await,
        Commands::Schedule(cmd) => cmd.execute(app, format).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    // The offline backend stands in until a vendor SDK adapter is linked
    let app = App::offline()?;
    app.transfers.spawn();

    dispatch(cli.command, &app, format).await
}
