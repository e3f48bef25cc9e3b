//! ChatRelay CLI - manual control of the relay
//!
//! Provides commands for:
//! - Running a sync in-process
//! - Inspecting routing decisions
//! - Showing and resetting feed cursors
//! - Task status reports
//! - Run history
//! - Configuration display and validation

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use chatrelay_core::config::Config;
use commands::{
    completions::CompletionsCommand, config::ConfigCommand, cursor::CursorCommand,
    history::HistoryCommand, route::RouteCommand, status::StatusCommand, sync::SyncCommand,
    CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "chatrelay",
    version,
    about = "Relay task completions and file uploads to chat channels"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the sync loop once for one or all feeds
    Sync(SyncCommand),
    /// Show which channel an origin path or space routes to
    Route(RouteCommand),
    /// Show or reset stored feed cursors
    #[command(subcommand)]
    Cursor(CursorCommand),
    /// Aggregate task counts per status
    Status(StatusCommand),
    /// Show recent sync runs
    History(HistoryCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext {
        format,
        config_path: cli.config.unwrap_or_else(Config::default_path),
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Route(cmd) => cmd.execute(&ctx).await,
        Commands::Cursor(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::History(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}
