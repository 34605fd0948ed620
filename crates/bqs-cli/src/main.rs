//! bqs - BigQuery metadata inspection with a local cache.

mod commands;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bqs")]
#[command(about = "BigQuery metadata inspection and schema operations")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show BigQuery table or view metadata
    Show(commands::show::ShowArgs),

    /// Interactive BigQuery dataset browser
    Browse(commands::browse::BrowseArgs),

    /// Manage the local metadata cache
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Warnings only by default; the browser owns the terminal.
    let log_level = if cli.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Command::Show(args) => commands::show::run(args),
        Command::Browse(args) => commands::browse::run(args).await,
        Command::Cache { command } => commands::cache::run(command),
    }
}
