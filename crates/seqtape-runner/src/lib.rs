//! # seqtape Runner
//!
//! CLI entry point wiring the core together: configuration, workspace
//! layout, logging, the single-instance lock, the sequencer and its
//! gateways.
//!
//! ## Commands
//! - `run` - start the engine in the configured trading mode
//! - `replay` - rebuild state from the WAL and print the result

pub mod app;
pub mod assets;
pub mod config;
pub mod logging;
pub mod paths;
pub mod secrets;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "seqtape")]
#[command(about = "Deterministic event-sequencing core for crypto trading")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the engine in the configured trading mode
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Rebuild state by replaying the WAL, then print the result
    Replay {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Build the runtime and dispatch the CLI.
pub fn run() -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => app::run_live(config).await,
        Commands::Replay { config } => app::run_replay(config),
    }
}
