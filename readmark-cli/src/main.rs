//! # readmark
//!
//! CLI tool for driving read-state reconciliation against a local database.
//!
//! ## Commands
//!
//! - `append`: Record a timeline event locally
//! - `confirm`: Replace a local echo with its server-assigned id
//! - `mark-read`: Move the fully-read marker and read receipt of a room
//! - `status`: Show the read state of a room
//!
//! ## Example
//!
//! ```bash
//! # Record some events
//! readmark append --room '!room:example.org' --event '$e1'
//! readmark append --room '!room:example.org' --event '$e2'
//!
//! # Mark everything read without contacting the homeserver
//! readmark mark-read --room '!room:example.org' --force-marker --force-receipt --offline
//!
//! # Inspect
//! readmark status --room '!room:example.org'
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::append::{self, AppendArgs, ConfirmArgs};
use commands::mark_read::{self, MarkReadArgs};
use commands::status;

/// CLI tool for read-state reconciliation.
#[derive(Parser, Debug)]
#[command(name = "readmark")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./readmark.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a timeline event locally
    Append(AppendArgs),

    /// Replace a local echo with its server-assigned id
    Confirm(ConfirmArgs),

    /// Move the read pointers of a room
    MarkRead(MarkReadArgs),

    /// Show the read state of a room
    Status {
        /// Room to inspect
        #[arg(long)]
        room: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Append(args) => {
            append::run(&config, &args).await?;
        }
        Commands::Confirm(args) => {
            append::confirm(&config, &args).await?;
        }
        Commands::MarkRead(args) => {
            mark_read::run(&config, &args).await?;
        }
        Commands::Status { room } => {
            status::run(&config, &room).await?;
        }
    }

    Ok(())
}
