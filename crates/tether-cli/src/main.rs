//! Tether CLI
//!
//! Operator and demo tooling for the data-mediation layer. Every command runs
//! over an offline bridge: the simulated store answers all operations.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tether_core::{config::default_data_dir, SeedProfile, TetherConfig};

mod handlers;
mod logging;

use handlers::Session;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Tether - simulated backend, delegation bridge and reactive state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to config.toml in the data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through a short add/verify/delete session
    Demo {
        /// Clients seeded when no snapshot exists
        #[arg(long, default_value = "3")]
        clients: u32,

        /// Files per seeded client
        #[arg(long, default_value = "2")]
        files: u32,

        /// Seed for generated sizes and statuses
        #[arg(long, default_value = "7")]
        seed: u64,
    },

    /// Show the status summary and recent activity
    Status {
        /// Number of log entries to show
        #[arg(short, long, default_value = "10")]
        logs: usize,
    },

    /// Run the integrity audit
    Check,

    /// Write a snapshot of the store
    Persist {
        /// Destination (defaults to the configured snapshot path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_data_dir().join("config.toml"));
    let mut config = TetherConfig::load_or_default(&config_path)?;

    logging::init(cli.verbose, &config.logging);
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    if let Commands::Demo {
        clients,
        files,
        seed,
    } = cli.command
    {
        config.store.seed = SeedProfile::Demo {
            clients,
            files_per_client: files,
            seed,
        };
    }

    let session = Session::open(&config)?;

    match cli.command {
        Commands::Demo { .. } => handlers::demo::run(&session).await?,
        Commands::Status { logs } => handlers::status::run(&session, logs).await?,
        Commands::Check => handlers::check::run(&session).await?,
        Commands::Persist { output } => handlers::persist::run(&session, output).await?,
    }

    Ok(())
}
