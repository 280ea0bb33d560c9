//! TileChanges CLI - Command-line interface
//!
//! Records change checkpoints for tiled collections and reports which tiles
//! of a tile matrix set changed since a checkpoint.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error};

use commands::changes::ChangesArgs;
use commands::checkpoint::CheckpointCommands;
use commands::collection::CollectionCommands;
use commands::common::{build_service, GlobalOptions};
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "tilechanges", version, about, long_about = None)]
struct Cli {
    /// Use this config file instead of ~/.tilechanges/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overriding logging.level (e.g. debug, tilechanges=trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Record and inspect checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },

    /// Report the tiles changed since a checkpoint
    Changes(ChangesArgs),

    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = GlobalOptions {
        config_path: cli.config,
    };

    // Config commands must work even when the file is broken
    if let Commands::Config { command } = cli.command {
        return commands::config::run(&options, command);
    }

    let mut config = options.load_config()?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    let _log_guard = tilechanges::logging::init_logging(&config.logging)?;
    debug!(
        version = tilechanges::VERSION,
        config = %options.config_path().display(),
        "Starting tilechanges"
    );

    let service = build_service(&config)?;
    match cli.command {
        Commands::Checkpoint { command } => commands::checkpoint::run(&service, command),
        Commands::Changes(args) => commands::changes::run(&service, &config, args),
        Commands::Collection { command } => commands::collection::run(&service, command),
        Commands::Config { .. } => Ok(()),
    }
}
